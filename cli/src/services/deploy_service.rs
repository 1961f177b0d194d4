//! Deploy service - drives stacks to a settled state
//!
//! Certificate first (always in us-east-1), then the website, then the
//! pipeline. Outputs of each stack become parameters of the next.

use colored::Colorize;
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::DeploySettings;
use crate::domain::stack::{
    requires_recreate, StackKind, StackPhase, OUTPUT_CERTIFICATE_ARN, OUTPUT_DISTRIBUTION_ID,
    OUTPUT_ROOT_BUCKET_NAME,
};
use crate::error::StackError;
use crate::infrastructure::{StackClient, StackDescription, UpdateOutcome};
use crate::stacks::{pipeline, website};
use crate::ui;

/// One client for the certificate region, one for the target region
pub struct StackClients {
    pub certificate: Box<dyn StackClient>,
    pub main: Box<dyn StackClient>,
}

impl StackClients {
    pub fn for_kind(&self, kind: StackKind) -> &dyn StackClient {
        match kind {
            StackKind::Certificate => self.certificate.as_ref(),
            StackKind::Website | StackKind::Pipeline => self.main.as_ref(),
        }
    }
}

/// A stack after a deploy step
#[derive(Debug, Clone)]
pub struct DeployedStack {
    pub kind: StackKind,
    pub region: String,
    pub description: StackDescription,
}

/// Service for deploying the site stacks
pub struct DeployService<'a> {
    settings: &'a DeploySettings,
}

impl<'a> DeployService<'a> {
    pub fn new(settings: &'a DeploySettings) -> Self {
        Self { settings }
    }

    /// Deploy `kinds` in order.
    ///
    /// Parameters for a stack come from the outputs of its upstream stack:
    /// from this run when it was deployed just before, otherwise from the
    /// already deployed upstream stack.
    pub async fn deploy(
        &self,
        clients: &StackClients,
        templates: &HashMap<StackKind, String>,
        kinds: &[StackKind],
    ) -> Result<Vec<DeployedStack>, StackError> {
        let mut deployed: Vec<DeployedStack> = Vec::new();
        let total = kinds.len();

        for (index, kind) in kinds.iter().copied().enumerate() {
            let client = clients.for_kind(kind);
            let name = self.settings.stacks.for_kind(kind);
            ui::print_step(index + 1, total, &format!("{} ({})", name, client.region()));

            let body = templates.get(&kind).ok_or_else(|| StackError::MissingTemplate {
                stack: name.to_string(),
            })?;

            let upstream = match kind.upstream() {
                Some(up) => Some(self.upstream_outputs(clients, up, &deployed).await?),
                None => None,
            };
            let parameters = parameters_for(kind, upstream.as_ref(), clients.main.region())?;

            let description = self.deploy_stack(client, name, body, &parameters).await?;
            deployed.push(DeployedStack {
                kind,
                region: client.region().to_string(),
                description,
            });
            println!();
        }

        Ok(deployed)
    }

    async fn upstream_outputs(
        &self,
        clients: &StackClients,
        upstream: StackKind,
        deployed: &[DeployedStack],
    ) -> Result<StackDescription, StackError> {
        if let Some(stack) = deployed.iter().find(|d| d.kind == upstream) {
            return Ok(stack.description.clone());
        }

        let name = self.settings.stacks.for_kind(upstream);
        debug!("Reading outputs of deployed stack {}", name);
        clients
            .for_kind(upstream)
            .describe_stack(name)
            .await?
            .ok_or_else(|| StackError::NotFound {
                stack: name.to_string(),
            })
    }

    /// Create or update one stack and wait for it to settle.
    pub async fn deploy_stack(
        &self,
        client: &dyn StackClient,
        name: &str,
        template_body: &str,
        parameters: &[(String, String)],
    ) -> Result<StackDescription, StackError> {
        let mut current = client.describe_stack(name).await?;

        if let Some(stack) = &current {
            if !StackPhase::classify(&stack.status).is_terminal() {
                info!(
                    "Stack {} is busy ({}), waiting before deploying",
                    name, stack.status
                );
                current = self.wait_until_settled(client, name).await?;
            }
        }

        if let Some(stack) = &current {
            if requires_recreate(&stack.status) {
                warn!(
                    "Stack {} has status: {}. Deleting it for a fresh deployment.",
                    name, stack.status
                );
                client.delete_stack(name).await?;
                self.wait_for_deletion(client, name).await?;
                current = None;
            }
        }

        match current {
            None => {
                info!("Stack {} does not exist. Creating a new stack.", name);
                client.create_stack(name, template_body, parameters).await?;
                info!(
                    "Stack {} creation initiated in region {}.",
                    name,
                    client.region()
                );
            }
            Some(existing) => match client.update_stack(name, template_body, parameters).await? {
                UpdateOutcome::Started => {
                    info!(
                        "Stack {} update initiated in region {}.",
                        name,
                        client.region()
                    );
                }
                UpdateOutcome::NoChanges => {
                    info!(
                        "No updates to be performed for {} in region {}.",
                        name,
                        client.region()
                    );
                    return Ok(existing);
                }
            },
        }

        self.wait_for_stack(client, name).await
    }

    /// Poll until the stack reaches a successful terminal status.
    pub async fn wait_for_stack(
        &self,
        client: &dyn StackClient,
        name: &str,
    ) -> Result<StackDescription, StackError> {
        let stack = self
            .wait_until_settled(client, name)
            .await?
            .ok_or_else(|| StackError::NotFound {
                stack: name.to_string(),
            })?;

        match StackPhase::classify(&stack.status) {
            StackPhase::Succeeded => {
                info!("Stack {} operation successful.", name);
                Ok(stack)
            }
            _ => Err(failure(&stack)),
        }
    }

    /// Poll until the stack is gone.
    pub async fn wait_for_deletion(
        &self,
        client: &dyn StackClient,
        name: &str,
    ) -> Result<(), StackError> {
        let started = Instant::now();
        let pb = ui::spinner(format!("Waiting for {} deletion to complete...", name));

        let result = loop {
            match client.describe_stack(name).await {
                Ok(None) => break Ok(()),
                Ok(Some(stack)) if stack.status == "DELETE_COMPLETE" => break Ok(()),
                Ok(Some(stack)) if stack.status == "DELETE_FAILED" => break Err(failure(&stack)),
                Ok(Some(stack)) => {
                    pb.set_message(format!("{}: {}", name, stack.status));
                }
                Err(e) => break Err(e),
            }

            if let Err(e) = self.check_timeout(name, started) {
                break Err(e);
            }
            sleep(self.settings.poll_interval).await;
        };

        pb.finish_and_clear();
        if result.is_ok() {
            info!("Stack {} successfully deleted.", name);
        }
        result
    }

    /// Poll until the stack leaves every `*_IN_PROGRESS` status.
    /// `None` when it disappeared while waiting.
    async fn wait_until_settled(
        &self,
        client: &dyn StackClient,
        name: &str,
    ) -> Result<Option<StackDescription>, StackError> {
        let started = Instant::now();
        let pb = ui::spinner(format!("Waiting for {}...", name));

        let result = loop {
            match client.describe_stack(name).await {
                Ok(None) => break Ok(None),
                Ok(Some(stack)) => {
                    debug!("Current stack status of {}: {}", name, stack.status);
                    pb.set_message(format!("{}: {}", name, stack.status));
                    if StackPhase::classify(&stack.status).is_terminal() {
                        break Ok(Some(stack));
                    }
                }
                Err(e) => break Err(e),
            }

            if let Err(e) = self.check_timeout(name, started) {
                break Err(e);
            }
            sleep(self.settings.poll_interval).await;
        };

        pb.finish_and_clear();
        result
    }

    fn check_timeout(&self, name: &str, started: Instant) -> Result<(), StackError> {
        if started.elapsed() >= self.settings.timeout {
            return Err(StackError::Timeout {
                stack: name.to_string(),
                timeout_secs: self.settings.timeout.as_secs(),
            });
        }
        Ok(())
    }

    /// Print the outcome of a deploy run
    pub fn print_summary(&self, deployed: &[DeployedStack]) {
        println!();
        println!("{}", "Deployment Summary".bold());
        println!("{}", "━".repeat(60));
        for stack in deployed {
            println!(
                "  {} {} [{}] {}",
                "✅".green(),
                stack.description.name,
                stack.region,
                stack.description.status.bright_green()
            );
            let mut outputs: Vec<_> = stack.description.outputs.iter().collect();
            outputs.sort();
            for (key, value) in outputs {
                println!("      {} = {}", key.dimmed(), value);
            }
        }
        println!("{}", "━".repeat(60));
    }
}

fn failure(stack: &StackDescription) -> StackError {
    let status = match &stack.status_reason {
        Some(reason) => format!("{} ({})", stack.status, reason),
        None => stack.status.clone(),
    };
    StackError::OperationFailed {
        stack: stack.name.clone(),
        status,
    }
}

/// Parameters a stack needs, taken from its upstream stack's outputs
fn parameters_for(
    kind: StackKind,
    upstream: Option<&StackDescription>,
    main_region: &str,
) -> Result<Vec<(String, String)>, StackError> {
    let upstream_output = |key: &str| -> Result<String, StackError> {
        match upstream {
            Some(stack) => stack.output(key).map(str::to_string),
            None => Err(StackError::MissingOutput {
                stack: kind.upstream().map(|k| k.key()).unwrap_or("upstream").to_string(),
                output: key.to_string(),
            }),
        }
    };

    let params = match kind {
        StackKind::Certificate => Vec::new(),
        StackKind::Website => {
            let certificate_arn = upstream_output(OUTPUT_CERTIFICATE_ARN)?;
            info!("Retrieved Certificate ARN: {}", certificate_arn);
            vec![
                (website::PARAM_CERTIFICATE_ARN.to_string(), certificate_arn),
                (
                    website::PARAM_DEPLOYMENT_REGION.to_string(),
                    main_region.to_string(),
                ),
            ]
        }
        StackKind::Pipeline => {
            let distribution_id = upstream_output(OUTPUT_DISTRIBUTION_ID)?;
            info!("Retrieved CloudFront Distribution ID: {}", distribution_id);
            let root_bucket = upstream_output(OUTPUT_ROOT_BUCKET_NAME)?;
            info!("Retrieved Root S3 Bucket Name: {}", root_bucket);
            vec![
                (pipeline::PARAM_DISTRIBUTION_ID.to_string(), distribution_id),
                (pipeline::PARAM_ROOT_BUCKET_NAME.to_string(), root_bucket),
            ]
        }
    };

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory CloudFormation: each describe pops the next scripted status
    /// for the stack, holding on the last one.
    #[derive(Default)]
    struct FakeClient {
        region: String,
        statuses: Mutex<HashMap<String, VecDeque<Option<String>>>>,
        outputs: Mutex<HashMap<String, HashMap<String, String>>>,
        no_changes: Mutex<bool>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn new(region: &str) -> Self {
            Self {
                region: region.to_string(),
                ..Default::default()
            }
        }

        fn script(&self, name: &str, statuses: &[Option<&str>]) {
            self.statuses.lock().unwrap().insert(
                name.to_string(),
                statuses.iter().map(|s| s.map(str::to_string)).collect(),
            );
        }

        fn set_outputs(&self, name: &str, outputs: &[(&str, &str)]) {
            self.outputs.lock().unwrap().insert(
                name.to_string(),
                outputs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl StackClient for FakeClient {
        fn region(&self) -> &str {
            &self.region
        }

        async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, StackError> {
            let mut statuses = self.statuses.lock().unwrap();
            let queue = statuses.entry(name.to_string()).or_default();
            let status = if queue.len() > 1 {
                queue.pop_front().flatten()
            } else {
                queue.front().cloned().flatten()
            };

            Ok(status.map(|status| StackDescription {
                name: name.to_string(),
                status,
                outputs: self
                    .outputs
                    .lock()
                    .unwrap()
                    .get(name)
                    .cloned()
                    .unwrap_or_default(),
                ..Default::default()
            }))
        }

        async fn create_stack(
            &self,
            name: &str,
            _template_body: &str,
            parameters: &[(String, String)],
        ) -> Result<(), StackError> {
            let keys: Vec<&str> = parameters.iter().map(|(k, _)| k.as_str()).collect();
            self.record(format!("create {} [{}]", name, keys.join(",")));
            Ok(())
        }

        async fn update_stack(
            &self,
            name: &str,
            _template_body: &str,
            parameters: &[(String, String)],
        ) -> Result<UpdateOutcome, StackError> {
            let pairs: Vec<String> = parameters.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            self.record(format!("update {} [{}]", name, pairs.join(",")));
            if *self.no_changes.lock().unwrap() {
                Ok(UpdateOutcome::NoChanges)
            } else {
                Ok(UpdateOutcome::Started)
            }
        }

        async fn delete_stack(&self, name: &str) -> Result<(), StackError> {
            self.record(format!("delete {}", name));
            Ok(())
        }
    }

    fn settings() -> DeploySettings {
        DeploySettings {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_when_missing() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script(
            "site",
            &[None, Some("CREATE_IN_PROGRESS"), Some("CREATE_COMPLETE")],
        );

        let stack = service
            .deploy_stack(&client, "site", "body", &[])
            .await
            .unwrap();

        assert_eq!(stack.status, "CREATE_COMPLETE");
        assert_eq!(client.calls(), vec!["create site []"]);
    }

    #[tokio::test]
    async fn test_update_existing() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script(
            "site",
            &[
                Some("CREATE_COMPLETE"),
                Some("UPDATE_IN_PROGRESS"),
                Some("UPDATE_COMPLETE"),
            ],
        );

        let params = vec![("Key".to_string(), "Value".to_string())];
        let stack = service
            .deploy_stack(&client, "site", "body", &params)
            .await
            .unwrap();

        assert_eq!(stack.status, "UPDATE_COMPLETE");
        assert_eq!(client.calls(), vec!["update site [Key=Value]"]);
    }

    #[tokio::test]
    async fn test_no_updates_is_success() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script("site", &[Some("UPDATE_ROLLBACK_COMPLETE")]);
        *client.no_changes.lock().unwrap() = true;

        let stack = service
            .deploy_stack(&client, "site", "body", &[])
            .await
            .unwrap();

        assert_eq!(stack.status, "UPDATE_ROLLBACK_COMPLETE");
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_complete_is_recreated() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script(
            "site",
            &[
                Some("ROLLBACK_COMPLETE"),
                Some("DELETE_IN_PROGRESS"),
                None,
                Some("CREATE_IN_PROGRESS"),
                Some("CREATE_COMPLETE"),
            ],
        );

        let stack = service
            .deploy_stack(&client, "site", "body", &[])
            .await
            .unwrap();

        assert_eq!(stack.status, "CREATE_COMPLETE");
        assert_eq!(client.calls(), vec!["delete site", "create site []"]);
    }

    #[tokio::test]
    async fn test_failed_operation_is_error() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script(
            "site",
            &[
                Some("CREATE_COMPLETE"),
                Some("UPDATE_IN_PROGRESS"),
                Some("UPDATE_ROLLBACK_IN_PROGRESS"),
                Some("UPDATE_ROLLBACK_COMPLETE"),
            ],
        );

        let err = service
            .deploy_stack(&client, "site", "body", &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StackError::OperationFailed { ref status, .. } if status == "UPDATE_ROLLBACK_COMPLETE"
        ));
    }

    #[tokio::test]
    async fn test_busy_stack_is_waited_on_first() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script(
            "site",
            &[
                Some("UPDATE_IN_PROGRESS"),
                Some("UPDATE_COMPLETE"),
                Some("UPDATE_IN_PROGRESS"),
                Some("UPDATE_COMPLETE"),
            ],
        );

        service
            .deploy_stack(&client, "site", "body", &[])
            .await
            .unwrap();
        assert_eq!(client.calls(), vec!["update site []"]);
    }

    #[tokio::test]
    async fn test_timeout() {
        let settings = DeploySettings {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script("site", &[Some("CREATE_IN_PROGRESS")]);

        let err = service.wait_for_stack(&client, "site").await.unwrap_err();
        assert!(matches!(err, StackError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_stack_vanishing_during_wait_is_not_found() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script("site", &[Some("CREATE_IN_PROGRESS"), None]);

        let err = service.wait_for_stack(&client, "site").await.unwrap_err();
        assert!(matches!(err, StackError::NotFound { ref stack } if stack == "site"));
    }

    #[tokio::test]
    async fn test_delete_failed_is_recreated() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script(
            "site",
            &[
                Some("DELETE_FAILED"),
                Some("DELETE_IN_PROGRESS"),
                None,
                Some("CREATE_COMPLETE"),
            ],
        );

        let stack = service
            .deploy_stack(&client, "site", "body", &[])
            .await
            .unwrap();

        assert_eq!(stack.status, "CREATE_COMPLETE");
        assert_eq!(client.calls(), vec!["delete site", "create site []"]);
    }

    #[tokio::test]
    async fn test_missing_template_is_reported_before_any_call() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let clients = StackClients {
            certificate: Box::new(FakeClient::new("us-east-1")),
            main: Box::new(FakeClient::new("us-west-2")),
        };

        let err = service
            .deploy(&clients, &HashMap::new(), &[StackKind::Certificate])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StackError::MissingTemplate { ref stack } if stack == "acm-certificate-stack"
        ));
    }

    #[test]
    fn test_delete_failed_is_error() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let client = FakeClient::new("us-west-2");
        client.script("site", &[Some("DELETE_IN_PROGRESS"), Some("DELETE_FAILED")]);

        let result = tokio_test::block_on(service.wait_for_deletion(&client, "site"));
        assert!(matches!(result, Err(StackError::OperationFailed { .. })));
    }

    fn deployed_clients() -> (StackClients, HashMap<StackKind, String>) {
        let certificate = FakeClient::new("us-east-1");
        certificate.script("acm-certificate-stack", &[None, Some("CREATE_COMPLETE")]);
        certificate.set_outputs(
            "acm-certificate-stack",
            &[("CertificateArn", "arn:aws:acm:us-east-1:1:certificate/x")],
        );

        let main = FakeClient::new("eu-west-1");
        main.script("portfolio-website-stack", &[None, Some("CREATE_COMPLETE")]);
        main.set_outputs(
            "portfolio-website-stack",
            &[("DistributionId", "E2ABC"), ("RootBucketName", "example.com")],
        );
        main.script("cicd-pipeline-stack", &[None, Some("CREATE_COMPLETE")]);

        let templates = StackKind::ALL
            .iter()
            .map(|k| (*k, format!("# {}", k)))
            .collect();

        (
            StackClients {
                certificate: Box::new(certificate),
                main: Box::new(main),
            },
            templates,
        )
    }

    #[tokio::test]
    async fn test_deploy_all_threads_outputs() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let (clients, templates) = deployed_clients();

        let deployed = service
            .deploy(&clients, &templates, &StackKind::ALL)
            .await
            .unwrap();

        assert_eq!(deployed.len(), 3);
        assert_eq!(deployed[0].region, "us-east-1");
        assert_eq!(deployed[1].region, "eu-west-1");
        assert_eq!(
            deployed[1].description.output("DistributionId").unwrap(),
            "E2ABC"
        );
    }

    #[test]
    fn test_parameters_for_website() {
        let mut cert = StackDescription::default();
        cert.outputs
            .insert("CertificateArn".to_string(), "arn:cert".to_string());

        let params = parameters_for(StackKind::Website, Some(&cert), "eu-west-1").unwrap();
        assert_eq!(
            params,
            vec![
                ("CertificateArn".to_string(), "arn:cert".to_string()),
                ("DeploymentRegion".to_string(), "eu-west-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_parameters_for_pipeline_missing_output() {
        let mut website = StackDescription {
            name: "portfolio-website-stack".to_string(),
            ..Default::default()
        };
        website
            .outputs
            .insert("DistributionId".to_string(), "E2ABC".to_string());

        let err = parameters_for(StackKind::Pipeline, Some(&website), "us-west-2").unwrap_err();
        assert!(matches!(
            err,
            StackError::MissingOutput { ref output, ref stack } if output == "RootBucketName" && stack == "portfolio-website-stack"
        ));
    }

    #[tokio::test]
    async fn test_single_stack_reads_upstream_outputs() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let certificate = FakeClient::new("us-east-1");
        let main = FakeClient::new("us-west-2");
        main.script("portfolio-website-stack", &[Some("CREATE_COMPLETE")]);
        main.set_outputs(
            "portfolio-website-stack",
            &[("DistributionId", "E2ABC"), ("RootBucketName", "example.com")],
        );
        main.script(
            "cicd-pipeline-stack",
            &[Some("CREATE_COMPLETE"), Some("UPDATE_COMPLETE")],
        );
        let clients = StackClients {
            certificate: Box::new(certificate),
            main: Box::new(main),
        };
        let templates = HashMap::from([(StackKind::Pipeline, "# pipeline".to_string())]);

        let deployed = service
            .deploy(&clients, &templates, &[StackKind::Pipeline])
            .await
            .unwrap();
        assert_eq!(deployed[0].description.status, "UPDATE_COMPLETE");
    }

    #[tokio::test]
    async fn test_single_stack_without_upstream_fails() {
        let settings = settings();
        let service = DeployService::new(&settings);
        let clients = StackClients {
            certificate: Box::new(FakeClient::new("us-east-1")),
            main: Box::new(FakeClient::new("us-west-2")),
        };
        let templates = HashMap::from([(StackKind::Website, "# website".to_string())]);

        let err = service
            .deploy(&clients, &templates, &[StackKind::Website])
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::NotFound { ref stack } if stack == "acm-certificate-stack"));
    }
}
