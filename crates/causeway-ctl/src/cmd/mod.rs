//! Subcommand implementations for causeway-ctl.

pub mod http;
pub mod session;
pub mod status;
