//! Command implementations for kitchen-cli

pub mod inspect;
pub mod lifecycle;
pub mod link;
pub mod provision;
pub mod report;
pub mod seed;

pub use inspect::{run_check_manifest, run_list_extensions};
pub use lifecycle::{run_disable, run_uninstall, run_unlink};
pub use link::run_link;
pub use provision::{run_install_dependencies, run_provision};
pub use seed::{run_reset_seed_markers, run_seed};
