//! Website hosting stack
//!
//! Two S3 website buckets (the site itself and a `www.` redirect), a
//! CloudFront distribution in front of each, a bucket policy for the site
//! bucket and Route53 alias records for both names.

use serde_json::{json, Value};

use crate::config::{EnvKey, SiteEnv};
use crate::domain::stack::{OUTPUT_DISTRIBUTION_ID, OUTPUT_ROOT_BUCKET_NAME};
use crate::error::SiteformError;
use crate::template::intrinsic::{get_att, reference, sub_with};
use crate::template::{Output, Parameter, Resource, Template};

pub const PARAM_DEPLOYMENT_REGION: &str = "DeploymentRegion";
pub const PARAM_CERTIFICATE_ARN: &str = "CertificateArn";

pub const ROOT_BUCKET: &str = "PortfolioRootBucket";
pub const REDIRECT_BUCKET: &str = "PortfolioRedirectBucket";
pub const ROOT_DISTRIBUTION: &str = "PortfolioRootDistribution";
pub const REDIRECT_DISTRIBUTION: &str = "PortfolioRedirectDistribution";
pub const ROOT_BUCKET_POLICY: &str = "PortfolioRootBucketPolicy";
pub const ROOT_DNS_RECORD: &str = "PortfolioRootDNSRecord";
pub const REDIRECT_DNS_RECORD: &str = "PortfolioRedirectDNSRecord";

/// Hosted zone of every CloudFront distribution, fixed by AWS
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// Managed-CachingOptimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

pub fn build(env: &SiteEnv) -> Result<Template, SiteformError> {
    let domain = env.require(EnvKey::DomainName)?;
    let hosted_zone_id = env.require(EnvKey::HostedZoneId)?;
    let www = format!("www.{}", domain);

    let mut template =
        Template::new("Infrastructure for hosting a portfolio website using CloudFormation.");

    template.add_parameter(
        PARAM_DEPLOYMENT_REGION,
        Parameter::string("AWS region for deployment"),
    )?;
    template.add_parameter(
        PARAM_CERTIFICATE_ARN,
        Parameter::string("The ARN of the ACM certificate in us-east-1"),
    )?;

    template.add_resource(
        ROOT_BUCKET,
        Resource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketName": domain,
                "WebsiteConfiguration": {
                    "IndexDocument": "index.html",
                    "ErrorDocument": "error.html",
                },
                "PublicAccessBlockConfiguration": open_public_access(),
            }),
        ),
    )?;

    template.add_resource(
        REDIRECT_BUCKET,
        Resource::new(
            "AWS::S3::Bucket",
            json!({
                "BucketName": www,
                "WebsiteConfiguration": {
                    "RedirectAllRequestsTo": {
                        "HostName": domain,
                        "Protocol": "http",
                    },
                },
                "PublicAccessBlockConfiguration": open_public_access(),
            }),
        ),
    )?;

    template.add_resource(
        ROOT_DISTRIBUTION,
        Resource::new(
            "AWS::CloudFront::Distribution",
            distribution(Distribution {
                domain,
                origin_id: "S3-Portfolio-Root",
                origin_host: "${DomainName}.s3-website-${DeploymentRegion}.amazonaws.com",
                alias: domain,
                comment: "'Root' distribution",
            }),
        )
        .depends_on([ROOT_BUCKET]),
    )?;

    template.add_resource(
        REDIRECT_DISTRIBUTION,
        Resource::new(
            "AWS::CloudFront::Distribution",
            distribution(Distribution {
                domain,
                origin_id: "S3-Portfolio-Redirect",
                origin_host: "www.${DomainName}.s3-website-${DeploymentRegion}.amazonaws.com",
                alias: &www,
                comment: "'Redirect' distribution",
            }),
        )
        .depends_on([REDIRECT_BUCKET]),
    )?;

    let objects = format!("arn:aws:s3:::{}/*", domain);
    template.add_resource(
        ROOT_BUCKET_POLICY,
        Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": reference(ROOT_BUCKET),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [
                        {
                            "Sid": "PublicReadForWebsiteAccess",
                            "Effect": "Allow",
                            "Principal": "*",
                            "Action": "s3:GetObject",
                            "Resource": objects,
                        },
                        {
                            "Sid": "CloudFrontDistributionReadAccess",
                            "Effect": "Allow",
                            "Principal": { "Service": "cloudfront.amazonaws.com" },
                            "Action": "s3:GetObject",
                            "Resource": objects,
                            "Condition": {
                                "StringEquals": {
                                    "AWS:SourceArn": sub_with(
                                        "arn:aws:cloudfront::${AWS::AccountId}:distribution/${DistributionId}",
                                        [("DistributionId", reference(ROOT_DISTRIBUTION))],
                                    ),
                                },
                            },
                        },
                    ],
                },
            }),
        )
        .depends_on([ROOT_DISTRIBUTION, ROOT_BUCKET]),
    )?;

    template.add_resource(
        ROOT_DNS_RECORD,
        alias_record(hosted_zone_id, domain, ROOT_DISTRIBUTION),
    )?;
    template.add_resource(
        REDIRECT_DNS_RECORD,
        alias_record(hosted_zone_id, &www, REDIRECT_DISTRIBUTION),
    )?;

    template.add_output(
        OUTPUT_DISTRIBUTION_ID,
        Output::new(reference(ROOT_DISTRIBUTION))
            .description("ID of the 'root' CloudFront distribution"),
    )?;
    template.add_output(
        OUTPUT_ROOT_BUCKET_NAME,
        Output::new(reference(ROOT_BUCKET)).description("Name of the 'root' S3 bucket"),
    )?;

    Ok(template)
}

fn open_public_access() -> Value {
    json!({
        "BlockPublicAcls": false,
        "IgnorePublicAcls": false,
        "BlockPublicPolicy": false,
        "RestrictPublicBuckets": false,
    })
}

struct Distribution<'a> {
    domain: &'a str,
    origin_id: &'a str,
    origin_host: &'a str,
    alias: &'a str,
    comment: &'a str,
}

fn distribution(d: Distribution<'_>) -> Value {
    json!({
        "DistributionConfig": {
            "Origins": [
                {
                    "Id": d.origin_id,
                    "DomainName": sub_with(
                        d.origin_host,
                        [
                            ("DomainName", json!(d.domain)),
                            ("DeploymentRegion", reference(PARAM_DEPLOYMENT_REGION)),
                        ],
                    ),
                    "CustomOriginConfig": { "OriginProtocolPolicy": "http-only" },
                },
            ],
            "Enabled": true,
            "Comment": d.comment,
            "Aliases": [d.alias],
            "ViewerCertificate": {
                "AcmCertificateArn": reference(PARAM_CERTIFICATE_ARN),
                "SslSupportMethod": "sni-only",
                "MinimumProtocolVersion": "TLSv1.2_2021",
            },
            "DefaultCacheBehavior": {
                "TargetOriginId": d.origin_id,
                "ViewerProtocolPolicy": "redirect-to-https",
                "AllowedMethods": ["GET", "HEAD"],
                "CachedMethods": ["GET", "HEAD"],
                "ForwardedValues": {
                    "QueryString": false,
                    "Cookies": { "Forward": "none" },
                },
                "CachePolicyId": CACHING_OPTIMIZED_POLICY_ID,
            },
            "PriceClass": "PriceClass_All",
            "HttpVersion": "http3",
        },
    })
}

fn alias_record(hosted_zone_id: &str, name: &str, distribution_id: &str) -> Resource {
    Resource::new(
        "AWS::Route53::RecordSet",
        json!({
            "HostedZoneId": hosted_zone_id,
            "Name": name,
            "Type": "A",
            "AliasTarget": {
                "DNSName": get_att(distribution_id, "DomainName"),
                "HostedZoneId": CLOUDFRONT_HOSTED_ZONE_ID,
            },
        }),
    )
}
