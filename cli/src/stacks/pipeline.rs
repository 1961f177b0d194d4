//! CI/CD pipeline stack
//!
//! GitHub (through a CodeStar connection) → CodeBuild → S3 deploy into the
//! site bucket. Each role only gets the actions its service needs.

use serde_json::{json, Value};

use crate::config::{EnvKey, SiteEnv};
use crate::error::SiteformError;
use crate::template::intrinsic::{get_att, join, reference, sub, AWS_ACCOUNT_ID};
use crate::template::{Parameter, Resource, Template};

pub const PARAM_DISTRIBUTION_ID: &str = "DistributionId";
pub const PARAM_ROOT_BUCKET_NAME: &str = "RootBucketName";

pub const ARTIFACT_BUCKET: &str = "PipelineArtifactBucket";
pub const CODEBUILD_ROLE: &str = "CodeBuildServiceRole";
pub const CODEBUILD_PROJECT: &str = "CodeBuildGitHubPortfolio";
pub const CODEPIPELINE_ROLE: &str = "CodePipelineServiceRole";
pub const PIPELINE: &str = "PipelineGitHubPortfolio";

pub const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:5.0";
pub const SOURCE_BRANCH: &str = "main";

/// Next.js static export: build into `out/`, then invalidate the distribution
pub const BUILDSPEC: &str = r#"version: 0.2
phases:
  install:
    commands:
      - npm install
  build:
    commands:
      - npm run build
  post_build:
    commands:
      - aws cloudfront create-invalidation --distribution-id $DISTRIBUTION_ID --paths "/*"
artifacts:
  files:
    - "**/*"
  base-directory: out
cache:
  paths:
    - "node_modules/**/*"
    - ".next/cache/**/*"
"#;

/// Domain made safe for IAM policy, project and pipeline names
pub fn sanitize_domain(domain: &str) -> String {
    domain.replace(['.', '/'], "-")
}

pub fn build(env: &SiteEnv) -> Result<Template, SiteformError> {
    let domain = env.require(EnvKey::DomainName)?;
    let user = env.require(EnvKey::GithubUserName)?;
    let repo = env.require(EnvKey::GithubRepoName)?;
    let connection_arn = env.require(EnvKey::GithubAppConnectionArn)?;
    let sanitized = sanitize_domain(domain);

    let mut template = Template::new(
        "CloudFormation stack for creating CI/CD pipeline with CodeBuild and CodePipeline.",
    );

    template.add_parameter(
        PARAM_DISTRIBUTION_ID,
        Parameter::string("The Distribution ID of the 'root' CloudFront distribution."),
    )?;
    template.add_parameter(
        PARAM_ROOT_BUCKET_NAME,
        Parameter::string("The name of the 'root' S3 Bucket."),
    )?;

    template.add_resource(ARTIFACT_BUCKET, Resource::new("AWS::S3::Bucket", Value::Null))?;

    let artifact_bucket_arns = bucket_arns(reference(ARTIFACT_BUCKET));

    template.add_resource(
        CODEBUILD_ROLE,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role("codebuild.amazonaws.com"),
                "Policies": [
                    {
                        "PolicyName": format!("CodeBuildPolicy-{}", sanitized),
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [
                                allow(
                                    json!(["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"]),
                                    json!([sub(
                                        "arn:aws:logs:${AWS::Region}:${AWS::AccountId}:log-group:/aws/codebuild/Build-GitHubPortfolio*",
                                    )]),
                                ),
                                allow(
                                    json!(["cloudfront:CreateInvalidation"]),
                                    json!([join("", [
                                        json!("arn:aws:cloudfront::"),
                                        reference(AWS_ACCOUNT_ID),
                                        json!(":distribution/"),
                                        reference(PARAM_DISTRIBUTION_ID),
                                    ])]),
                                ),
                                allow(
                                    json!(["s3:GetObject", "s3:PutObject", "s3:GetBucketLocation"]),
                                    json!(artifact_bucket_arns),
                                ),
                                allow(
                                    build_actions(),
                                    json!([connection_arn]),
                                ),
                            ],
                        },
                    },
                ],
            }),
        ),
    )?;

    template.add_resource(
        CODEBUILD_PROJECT,
        Resource::new(
            "AWS::CodeBuild::Project",
            json!({
                "Name": format!("Build-GitHubPortfolio-{}", sanitized),
                "Source": {
                    "Type": "GITHUB",
                    "Location": format!("https://github.com/{}/{}", user, repo),
                    "GitCloneDepth": 1,
                    "ReportBuildStatus": true,
                    "BuildSpec": BUILDSPEC,
                },
                "Environment": {
                    "ComputeType": "BUILD_GENERAL1_SMALL",
                    "Image": BUILD_IMAGE,
                    "Type": "LINUX_CONTAINER",
                    "EnvironmentVariables": [
                        { "Name": "DISTRIBUTION_ID", "Value": reference(PARAM_DISTRIBUTION_ID) },
                    ],
                },
                "ServiceRole": reference(CODEBUILD_ROLE),
                "Artifacts": { "Type": "NO_ARTIFACTS" },
            }),
        ),
    )?;

    let mut pipeline_bucket_arns = artifact_bucket_arns.clone();
    pipeline_bucket_arns.extend(bucket_arns(reference(PARAM_ROOT_BUCKET_NAME)));

    template.add_resource(
        CODEPIPELINE_ROLE,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": assume_role("codepipeline.amazonaws.com"),
                "Policies": [
                    {
                        "PolicyName": format!("CodePipelinePolicy-{}", sanitized),
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [
                                {
                                    "Effect": "Allow",
                                    "Action": "iam:PassRole",
                                    "Resource": "*",
                                    "Condition": {
                                        "StringEqualsIfExists": {
                                            "iam:PassedToService": [
                                                "codebuild.amazonaws.com",
                                                "cloudformation.amazonaws.com",
                                            ],
                                        },
                                    },
                                },
                                allow(
                                    json!([
                                        "s3:GetObject",
                                        "s3:PutObject",
                                        "s3:PutObjectAcl",
                                        "s3:PutObjectVersionAcl",
                                        "s3:GetBucketLocation",
                                        "s3:ListBucket",
                                    ]),
                                    json!(pipeline_bucket_arns),
                                ),
                                allow(
                                    build_actions(),
                                    json!([get_att(CODEBUILD_PROJECT, "Arn"), connection_arn]),
                                ),
                            ],
                        },
                    },
                ],
            }),
        ),
    )?;

    template.add_resource(
        PIPELINE,
        Resource::new(
            "AWS::CodePipeline::Pipeline",
            json!({
                "Name": format!("Pipeline-GitHubPortfolio-{}", sanitized),
                "RoleArn": get_att(CODEPIPELINE_ROLE, "Arn"),
                "PipelineType": "V2",
                "ArtifactStore": {
                    "Type": "S3",
                    "Location": reference(ARTIFACT_BUCKET),
                },
                "Stages": [
                    stage(
                        "Source",
                        "SourceAction",
                        ("Source", "CodeStarSourceConnection"),
                        json!({
                            "ConnectionArn": connection_arn,
                            "FullRepositoryId": format!("{}/{}", user, repo),
                            "BranchName": SOURCE_BRANCH,
                        }),
                        None,
                        Some("SourceArtifact"),
                    ),
                    stage(
                        "Build",
                        "BuildAction",
                        ("Build", "CodeBuild"),
                        json!({ "ProjectName": reference(CODEBUILD_PROJECT) }),
                        Some("SourceArtifact"),
                        Some("BuildArtifact"),
                    ),
                    stage(
                        "Deploy",
                        "DeployAction",
                        ("Deploy", "S3"),
                        json!({
                            "BucketName": reference(PARAM_ROOT_BUCKET_NAME),
                            "Extract": "true",
                        }),
                        Some("BuildArtifact"),
                        None,
                    ),
                ],
            }),
        ),
    )?;

    Ok(template)
}

/// Bucket ARN and the ARN of every object in it
fn bucket_arns(bucket_name: Value) -> Vec<Value> {
    vec![
        join("", [json!("arn:aws:s3:::"), bucket_name.clone()]),
        join("", [json!("arn:aws:s3:::"), bucket_name, json!("/*")]),
    ]
}

fn assume_role(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Service": service },
                "Action": "sts:AssumeRole",
            },
        ],
    })
}

fn allow(actions: Value, resources: Value) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": resources,
    })
}

fn build_actions() -> Value {
    json!([
        "codestar-connections:UseConnection",
        "codebuild:BatchGetBuilds",
        "codebuild:StartBuild",
        "codebuild:StopBuild",
        "codebuild:ListBuilds",
    ])
}

fn stage(
    name: &str,
    action: &str,
    (category, provider): (&str, &str),
    configuration: Value,
    input: Option<&str>,
    output: Option<&str>,
) -> Value {
    let mut action = json!({
        "Name": action,
        "ActionTypeId": {
            "Category": category,
            "Owner": "AWS",
            "Provider": provider,
            "Version": "1",
        },
        "Configuration": configuration,
        "RunOrder": 1,
    });
    if let Some(input) = input {
        action["InputArtifacts"] = json!([{ "Name": input }]);
    }
    if let Some(output) = output {
        action["OutputArtifacts"] = json!([{ "Name": output }]);
    }

    json!({ "Name": name, "Actions": [action] })
}
