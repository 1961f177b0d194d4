//! AWS regions accepted by `--region`.

use crate::error::ConfigError;

/// ACM certificates used by CloudFront must be issued in us-east-1
pub const CERTIFICATE_REGION: &str = "us-east-1";

/// Region for the website and pipeline stacks when none is given
pub const DEFAULT_REGION: &str = "us-west-2";

/// Regions with CloudFormation, S3 website endpoints and CodePipeline (as of 11/2024)
pub const VALID_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-north-1",
    "eu-south-1",
    "me-south-1",
    "sa-east-1",
];

pub fn is_valid(region: &str) -> bool {
    VALID_REGIONS.contains(&region)
}

pub fn validate(region: &str) -> Result<(), ConfigError> {
    if is_valid(region) {
        Ok(())
    } else {
        Err(ConfigError::UnknownRegion {
            region: region.to_string(),
        })
    }
}

/// clap value parser for `--region`
pub fn parse_region(value: &str) -> Result<String, String> {
    validate(value)
        .map(|_| value.to_string())
        .map_err(|_| format!("expected one of: {}", VALID_REGIONS.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(is_valid(CERTIFICATE_REGION));
        assert!(is_valid(DEFAULT_REGION));
    }

    #[test]
    fn test_unknown_region() {
        assert!(!is_valid("us-central-9"));
        assert!(matches!(
            validate("US-EAST-1"),
            Err(ConfigError::UnknownRegion { .. })
        ));
    }

    #[test]
    fn test_parse_region_lists_choices() {
        assert_eq!(parse_region("eu-west-1").unwrap(), "eu-west-1");
        let err = parse_region("nowhere").unwrap_err();
        assert!(err.contains("sa-east-1"));
    }
}
