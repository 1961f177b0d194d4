//! Centralized error types for siteform
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for siteform operations
#[derive(Error, Debug)]
pub enum SiteformError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Stack error: {0}")]
    Stack(#[from] StackError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required configuration missing: {field}. Set it in the .env file or the environment")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Unsupported region: {region}")]
    UnknownRegion { region: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },
}

/// Template construction errors
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Logical id {logical_id} is declared more than once")]
    DuplicateLogicalId { logical_id: String },

    #[error("{location} references undeclared {target}")]
    UnknownReference { location: String, target: String },

    #[error("Failed to serialize template: {message}")]
    Serialize { message: String },
}

/// CloudFormation stack lifecycle errors
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Stack {stack} operation failed with status {status}")]
    OperationFailed { stack: String, status: String },

    #[error("Stack {stack} did not settle within {timeout_secs}s")]
    Timeout { stack: String, timeout_secs: u64 },

    #[error("Stack {stack} has no output {output}")]
    MissingOutput { stack: String, output: String },

    #[error("No template loaded for stack {stack}")]
    MissingTemplate { stack: String },

    #[error("Stack {stack} does not exist")]
    NotFound { stack: String },

    #[error("CloudFormation API call {operation} failed: {message}")]
    Api { operation: String, message: String },
}
