//! Domain layer - pure logic
//!
//! No I/O here. Types and functions can be unit tested without AWS.

pub mod region;
pub mod stack;

pub use stack::{StackKind, StackPhase};
