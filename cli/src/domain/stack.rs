//! Stack domain types
//!
//! The three stacks, their fixed deploy order, and how CloudFormation
//! status strings map onto outcomes.

use std::fmt;

use crate::config::EnvKey;

/// Output of the certificate stack consumed by the website stack
pub const OUTPUT_CERTIFICATE_ARN: &str = "CertificateArn";
/// Outputs of the website stack consumed by the pipeline stack
pub const OUTPUT_DISTRIBUTION_ID: &str = "DistributionId";
pub const OUTPUT_ROOT_BUCKET_NAME: &str = "RootBucketName";

/// Stacks in deploy order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StackKind {
    /// ACM certificate for the apex and www names
    Certificate,
    /// S3 buckets, CloudFront distributions, Route53 records
    Website,
    /// CodeBuild project and CodePipeline fed from GitHub
    Pipeline,
}

impl StackKind {
    pub const ALL: [StackKind; 3] = [
        StackKind::Certificate,
        StackKind::Website,
        StackKind::Pipeline,
    ];

    /// Short name used in settings keys and log lines
    pub fn key(&self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::Website => "website",
            Self::Pipeline => "pipeline",
        }
    }

    pub fn default_stack_name(&self) -> &'static str {
        match self {
            Self::Certificate => "acm-certificate-stack",
            Self::Website => "portfolio-website-stack",
            Self::Pipeline => "cicd-pipeline-stack",
        }
    }

    /// File name of the generated template
    pub fn template_file(&self) -> &'static str {
        match self {
            Self::Certificate => "acm-certificate-stack.yaml",
            Self::Website => "portfolio-website-stack.yaml",
            Self::Pipeline => "cicd-pipeline-stack.yaml",
        }
    }

    /// Site values the generator for this stack reads
    pub fn required_keys(&self) -> &'static [EnvKey] {
        match self {
            Self::Certificate => &[EnvKey::DomainName, EnvKey::HostedZoneId],
            Self::Website => &[EnvKey::DomainName, EnvKey::HostedZoneId],
            Self::Pipeline => &[
                EnvKey::DomainName,
                EnvKey::GithubUserName,
                EnvKey::GithubRepoName,
                EnvKey::GithubAppConnectionArn,
            ],
        }
    }

    /// Stack whose outputs feed this one's parameters
    pub fn upstream(&self) -> Option<StackKind> {
        match self {
            Self::Certificate => None,
            Self::Website => Some(Self::Certificate),
            Self::Pipeline => Some(Self::Website),
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a stack stands after a DescribeStacks call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPhase {
    /// An operation is still running
    InProgress,
    /// Last operation finished successfully
    Succeeded,
    /// Last operation was rolled back
    RolledBack,
    /// Last operation failed
    Failed,
}

impl StackPhase {
    pub fn classify(status: &str) -> Self {
        match status {
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "DELETE_COMPLETE" | "IMPORT_COMPLETE" => {
                Self::Succeeded
            }
            "ROLLBACK_COMPLETE" | "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => {
                Self::RolledBack
            }
            s if s.ends_with("FAILED") => Self::Failed,
            _ => Self::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// A stack in one of these states cannot be updated and has to be
/// deleted before it is created again.
pub fn requires_recreate(status: &str) -> bool {
    matches!(status, "ROLLBACK_COMPLETE" | "DELETE_FAILED")
}
