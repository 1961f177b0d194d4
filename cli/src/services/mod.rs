//! Services layer - orchestration logic
//!
//! Coordinates domain rules with the CloudFormation adapter.

pub mod deploy_service;

pub use deploy_service::{DeployService, StackClients};
