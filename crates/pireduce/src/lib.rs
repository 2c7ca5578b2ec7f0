//! pireduce library: application logic for the partitioned-reduction CLI.

pub mod app;
pub mod config;
pub mod errors;
