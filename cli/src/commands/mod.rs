//! Command implementations, one module per subcommand

pub mod deploy;
pub mod generate;
pub mod status;
