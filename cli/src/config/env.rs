//! Site values loaded from a `.env` file and the process environment.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Keys the generators read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvKey {
    DomainName,
    HostedZoneId,
    GithubUserName,
    GithubRepoName,
    GithubAppConnectionArn,
}

impl EnvKey {
    pub const ALL: [EnvKey; 5] = [
        EnvKey::DomainName,
        EnvKey::HostedZoneId,
        EnvKey::GithubUserName,
        EnvKey::GithubRepoName,
        EnvKey::GithubAppConnectionArn,
    ];

    /// Variable name as written in `.env`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainName => "DOMAIN_NAME",
            Self::HostedZoneId => "HOSTED_ZONE_ID",
            Self::GithubUserName => "GITHUB_USER_NAME",
            Self::GithubRepoName => "GITHUB_REPO_NAME",
            Self::GithubAppConnectionArn => "GITHUB_APP_CONNECTION_ARN",
        }
    }
}

impl fmt::Display for EnvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-supplied site values
///
/// Values are free-form. The only check is presence: a generator asks for
/// the keys it needs through [`SiteEnv::require`].
#[derive(Debug, Clone, Default)]
pub struct SiteEnv {
    values: HashMap<EnvKey, String>,
}

impl SiteEnv {
    /// Load from `env_file` (if it exists), then let the process environment override.
    pub fn load(env_file: &Path) -> Result<Self> {
        let file_vars = read_env_file(env_file)?;
        Ok(Self::from_sources(&file_vars, |key| std::env::var(key).ok()))
    }

    /// Merge file variables with a lookup into the process environment.
    ///
    /// A variable already set in the environment wins over the file.
    pub fn from_sources<F>(file_vars: &HashMap<String, String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = HashMap::new();

        for key in EnvKey::ALL {
            let value = lookup(key.as_str()).or_else(|| file_vars.get(key.as_str()).cloned());
            if let Some(value) = value {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    values.insert(key, value);
                }
            }
        }

        Self { values }
    }

    /// Build directly from pairs
    #[cfg(test)]
    pub fn from_pairs<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (EnvKey, V)>,
        V: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }

    pub fn get(&self, key: EnvKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Get a value that must be present
    pub fn require(&self, key: EnvKey) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingField {
            field: key.as_str().to_string(),
        })
    }

    /// Check that every key in `keys` is present, reporting the first missing one
    pub fn require_all(&self, keys: &[EnvKey]) -> Result<(), ConfigError> {
        for key in keys {
            self.require(*key)?;
        }
        Ok(())
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        warn!(
            "No env file at {}, reading values from the environment only",
            path.display()
        );
        return Ok(HashMap::new());
    }

    debug!("Loading site values from {}", path.display());

    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.with_context(|| format!("Failed to parse {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# site").unwrap();
        writeln!(file, "DOMAIN_NAME=example.com").unwrap();
        writeln!(file, "HOSTED_ZONE_ID=\"Z123ABC\"").unwrap();
        writeln!(file, "export GITHUB_USER_NAME=octocat").unwrap();

        let vars = read_env_file(file.path()).unwrap();
        let env = SiteEnv::from_sources(&vars, no_env);

        assert_eq!(env.get(EnvKey::DomainName), Some("example.com"));
        assert_eq!(env.get(EnvKey::HostedZoneId), Some("Z123ABC"));
        assert_eq!(env.get(EnvKey::GithubUserName), Some("octocat"));
        assert_eq!(env.get(EnvKey::GithubRepoName), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join(".env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut vars = HashMap::new();
        vars.insert("DOMAIN_NAME".to_string(), "file.example.com".to_string());
        vars.insert("HOSTED_ZONE_ID".to_string(), "ZFILE".to_string());

        let env = SiteEnv::from_sources(&vars, |key| {
            (key == "DOMAIN_NAME").then(|| "env.example.com".to_string())
        });

        assert_eq!(env.get(EnvKey::DomainName), Some("env.example.com"));
        assert_eq!(env.get(EnvKey::HostedZoneId), Some("ZFILE"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = HashMap::new();
        vars.insert("GITHUB_REPO_NAME".to_string(), "   ".to_string());

        let env = SiteEnv::from_sources(&vars, no_env);
        let err = env.require(EnvKey::GithubRepoName).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "GITHUB_REPO_NAME"));
    }

    #[test]
    fn test_require_all_reports_first_missing() {
        let env = SiteEnv::from_pairs([(EnvKey::DomainName, "example.com")]);
        assert!(env.require_all(&[EnvKey::DomainName]).is_ok());

        let err = env
            .require_all(&[EnvKey::DomainName, EnvKey::HostedZoneId, EnvKey::GithubUserName])
            .unwrap_err();
        assert!(err.to_string().contains("HOSTED_ZONE_ID"));
    }
}
