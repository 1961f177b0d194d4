//! ACM certificate stack
//!
//! One DNS-validated certificate covering the apex and `www.` names,
//! exported so the website stack can attach it to CloudFront.

use serde_json::json;

use crate::config::{EnvKey, SiteEnv};
use crate::domain::stack::OUTPUT_CERTIFICATE_ARN;
use crate::error::SiteformError;
use crate::template::intrinsic::reference;
use crate::template::{Output, Resource, Template};

pub const CERTIFICATE: &str = "PortfolioCertificate";
pub const CERTIFICATE_EXPORT: &str = "PortfolioCertificateARN";

pub fn build(env: &SiteEnv) -> Result<Template, SiteformError> {
    let domain = env.require(EnvKey::DomainName)?;
    let hosted_zone_id = env.require(EnvKey::HostedZoneId)?;
    let www = format!("www.{}", domain);

    let mut template = Template::new("CloudFormation stack to generate ACM Certificate.");

    template.add_resource(
        CERTIFICATE,
        Resource::new(
            "AWS::CertificateManager::Certificate",
            json!({
                "DomainName": domain,
                "SubjectAlternativeNames": [www],
                "ValidationMethod": "DNS",
                "DomainValidationOptions": [
                    { "DomainName": domain, "HostedZoneId": hosted_zone_id },
                    { "DomainName": www, "HostedZoneId": hosted_zone_id },
                ],
            }),
        ),
    )?;

    template.add_output(
        OUTPUT_CERTIFICATE_ARN,
        Output::new(reference(CERTIFICATE))
            .description("ARN of the CloudFront certificate")
            .export(CERTIFICATE_EXPORT),
    )?;

    Ok(template)
}
