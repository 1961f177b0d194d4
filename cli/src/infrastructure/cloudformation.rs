//! CloudFormation adapter
//!
//! The deploy service talks to [`StackClient`]; [`CfnStackClient`] is the
//! AWS SDK implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability, Parameter};
use aws_sdk_cloudformation::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::error::StackError;

/// Snapshot of a stack from DescribeStacks
#[derive(Debug, Clone, Default)]
pub struct StackDescription {
    pub name: String,
    pub status: String,
    pub status_reason: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub outputs: HashMap<String, String>,
}

impl StackDescription {
    pub fn output(&self, key: &str) -> Result<&str, StackError> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StackError::MissingOutput {
                stack: self.name.clone(),
                output: key.to_string(),
            })
    }
}

/// Result of an UpdateStack call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Started,
    /// CloudFormation found nothing to change
    NoChanges,
}

/// Stack lifecycle calls used by the deployer
#[async_trait]
pub trait StackClient: Send + Sync {
    /// Region the client is bound to
    fn region(&self) -> &str;

    /// `None` when the stack does not exist
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, StackError>;

    async fn create_stack(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[(String, String)],
    ) -> Result<(), StackError>;

    async fn update_stack(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[(String, String)],
    ) -> Result<UpdateOutcome, StackError>;

    async fn delete_stack(&self, name: &str) -> Result<(), StackError>;
}

/// AWS SDK backed client
pub struct CfnStackClient {
    client: Client,
    region: String,
}

impl CfnStackClient {
    /// Load credentials from the default provider chain for `region`
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Client::new(&config),
            region: region.to_string(),
        }
    }
}

#[async_trait]
impl StackClient for CfnStackClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, StackError> {
        let response = match self.client.describe_stacks().stack_name(name).send().await {
            Ok(response) => response,
            Err(err) if service_message(&err).contains("does not exist") => {
                debug!("Stack {} does not exist in {}", name, self.region);
                return Ok(None);
            }
            Err(err) => return Err(api_error("DescribeStacks", &err)),
        };

        let Some(stack) = response.stacks().first() else {
            return Ok(None);
        };

        let outputs = stack
            .outputs()
            .iter()
            .filter_map(|o| match (o.output_key(), o.output_value()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            })
            .collect();

        let last_updated = stack
            .last_updated_time()
            .or(stack.creation_time())
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));

        Ok(Some(StackDescription {
            name: name.to_string(),
            status: stack
                .stack_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_reason: stack.stack_status_reason().map(str::to_string),
            last_updated,
            outputs,
        }))
    }

    async fn create_stack(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[(String, String)],
    ) -> Result<(), StackError> {
        self.client
            .create_stack()
            .stack_name(name)
            .template_body(template_body)
            .set_parameters(Some(to_parameters(parameters)))
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(|err| api_error("CreateStack", &err))?;
        Ok(())
    }

    async fn update_stack(
        &self,
        name: &str,
        template_body: &str,
        parameters: &[(String, String)],
    ) -> Result<UpdateOutcome, StackError> {
        match self
            .client
            .update_stack()
            .stack_name(name)
            .template_body(template_body)
            .set_parameters(Some(to_parameters(parameters)))
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
        {
            Ok(_) => Ok(UpdateOutcome::Started),
            Err(err) if service_message(&err).contains("No updates are to be performed") => {
                Ok(UpdateOutcome::NoChanges)
            }
            Err(err) => Err(api_error("UpdateStack", &err)),
        }
    }

    async fn delete_stack(&self, name: &str) -> Result<(), StackError> {
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|err| api_error("DeleteStack", &err))?;
        Ok(())
    }
}

fn to_parameters(parameters: &[(String, String)]) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|(key, value)| {
            Parameter::builder()
                .parameter_key(key)
                .parameter_value(value)
                .build()
        })
        .collect()
}

fn service_message<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata,
{
    err.as_service_error()
        .and_then(|e| e.message())
        .unwrap_or_default()
        .to_string()
}

fn api_error<E, R>(operation: &str, err: &SdkError<E, R>) -> StackError
where
    E: std::error::Error + ProvideErrorMetadata + 'static,
    R: std::fmt::Debug,
{
    StackError::Api {
        operation: operation.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}
