//! External media toolchain management

pub mod provisioner;

pub use provisioner::{ToolBinary, ToolProvisioner};
