//! CLI command implementations

mod config_management;
mod link_management;

pub use config_management::*;
pub use link_management::*;
