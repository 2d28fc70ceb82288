//! namediff-core
//!
//! Core library for differential testing of Mach-O install-name editors.
//!
//! A candidate reimplementation of `install_name_tool` is run side by side
//! with the reference tool on private copies of the same dylib, and the two
//! outputs are judged either byte-for-byte or by the load commands the
//! dynamic linker cares about.
//!
//! All decision logic lives here so it can be tested without real Mach-O
//! tooling installed; the CLI crate only discovers files and prints.

pub mod config;
pub mod model;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
