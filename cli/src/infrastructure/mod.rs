//! Infrastructure layer - external I/O adapters
//!
//! Everything that talks to AWS lives here.

pub mod cloudformation;

// Re-export commonly used types
pub use cloudformation::{CfnStackClient, StackClient, StackDescription, UpdateOutcome};
