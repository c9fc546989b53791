//! Shared test utilities for the civikitchen workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`extension`] - extension source tree builder
//! - [`kitchen`] - [`TestKitchen`](kitchen::TestKitchen): sources, extensions
//!   root and a scripted fake `cv` in one temporary directory

pub mod extension;
pub mod kitchen;

pub use extension::ExtensionFixture;
pub use kitchen::TestKitchen;
