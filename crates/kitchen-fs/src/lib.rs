//! Filesystem layer for civikitchen
//!
//! Provides the well-known file names of the provisioning system, atomic
//! writes for marker files, and format-agnostic configuration loading.

pub mod config;
pub mod constants;
pub mod error;
pub mod io;

pub use config::ConfigStore;
pub use constants::KitchenPath;
pub use error::{Error, Result};
