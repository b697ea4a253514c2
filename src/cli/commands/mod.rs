//! CLI command implementations.

pub mod init;
pub mod observe;
pub mod pattern;
pub mod run;
pub mod scenario;
