//! Loading the environment table and the bootstrap file
//!
//! Credential secrets in the bootstrap file may be written inline or pulled
//! from the process environment with `{ fromEnv: VAR }`, so real tokens never
//! have to live in the file.

use std::path::{Path, PathBuf};

use basecamp_core::{EnvironmentTable, StackConfig};
use basecamp_kube::{
    BootstrapConfig, CredentialFields, CredentialSpec, CredentialType, Stack, build_stack,
};
use serde::Deserialize;

use crate::error::{CliError, Result};

/// File name looked up under the user config directory
pub const ENVIRONMENTS_FILE: &str = "environments.yaml";

/// Where the environment table came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Explicit(PathBuf),
    UserConfig(PathBuf),
    Builtin,
}

impl std::fmt::Display for TableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSource::Explicit(path) | TableSource::UserConfig(path) => {
                write!(f, "{}", path.display())
            }
            TableSource::Builtin => write!(f, "built-in defaults"),
        }
    }
}

/// `<config dir>/basecamp/environments.yaml`, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("basecamp").join(ENVIRONMENTS_FILE))
}

/// Load the environment table: `--config`, then the user config file, then the built-ins
pub fn load_environments(explicit: Option<&Path>) -> Result<(EnvironmentTable, TableSource)> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(CliError::Io {
                message: format!("environment file not found: {}", path.display()),
            });
        }
        let table = EnvironmentTable::load_from(path)?;
        return Ok((table, TableSource::Explicit(path.to_path_buf())));
    }

    if let Some(path) = user_config_path().filter(|p| p.exists()) {
        tracing::debug!("using environment table {}", path.display());
        let table = EnvironmentTable::load_from(&path)?;
        return Ok((table, TableSource::UserConfig(path)));
    }

    Ok((EnvironmentTable::builtin(), TableSource::Builtin))
}

/// A secret field: inline text or the name of an environment variable
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SecretValue {
    FromEnv {
        #[serde(rename = "fromEnv")]
        from_env: String,
    },
    Literal(String),
}

impl SecretValue {
    fn resolve(&self, credential: &str) -> Result<String> {
        match self {
            SecretValue::Literal(value) => Ok(value.clone()),
            SecretValue::FromEnv { from_env } => std::env::var(from_env).map_err(|_| {
                CliError::config(
                    format!(
                        "environment variable {} for credential '{}' is not set",
                        from_env, credential
                    ),
                    Some(format!("export {}=<secret> before running basecamp", from_env)),
                )
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialEntry {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(rename = "type")]
    credential_type: CredentialType,
    #[serde(default)]
    username: Option<SecretValue>,
    #[serde(default)]
    password: Option<SecretValue>,
    #[serde(default)]
    token: Option<SecretValue>,
    #[serde(default)]
    private_key: Option<SecretValue>,
    #[serde(default)]
    known_hosts: Option<SecretValue>,
}

impl CredentialEntry {
    fn resolve(self) -> Result<CredentialSpec> {
        let name = self.name;
        let field = |value: Option<SecretValue>| -> Result<Option<String>> {
            value.map(|v| v.resolve(&name)).transpose()
        };
        let fields = CredentialFields {
            username: field(self.username)?,
            password: field(self.password)?,
            token: field(self.token)?,
            private_key: field(self.private_key)?,
            known_hosts: field(self.known_hosts)?,
        };
        Ok(CredentialSpec {
            name,
            namespace: self.namespace,
            credential_type: self.credential_type,
            fields,
        })
    }
}

/// On-disk shape of the bootstrap file
#[derive(Debug, Deserialize)]
struct BootstrapFile {
    #[serde(default)]
    credentials: Vec<CredentialEntry>,
    #[serde(flatten)]
    rest: BootstrapConfig,
}

/// Parse a bootstrap document, resolving `fromEnv` secrets
pub fn parse_bootstrap(yaml: &str) -> Result<BootstrapConfig> {
    let file: BootstrapFile = serde_yaml::from_str(yaml).map_err(|e| {
        CliError::config(format!("invalid bootstrap file: {}", e), None)
    })?;

    let mut config = file.rest;
    config.credentials = file
        .credentials
        .into_iter()
        .map(CredentialEntry::resolve)
        .collect::<Result<Vec<_>>>()?;
    Ok(config)
}

/// Load the bootstrap file, or an empty bootstrap (controllers only) when none is given
pub fn load_bootstrap(path: Option<&Path>) -> Result<BootstrapConfig> {
    let Some(path) = path else {
        return Ok(BootstrapConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|e| CliError::Io {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;
    parse_bootstrap(&content)
}

/// Resolve the environment and build its full graph
pub fn load_stack(
    environment: &str,
    config: Option<&Path>,
    bootstrap: Option<&Path>,
) -> Result<Stack> {
    let (table, source) = load_environments(config)?;
    tracing::debug!("environment table from {}", source);
    let stack_config: StackConfig = table.resolve(environment)?;
    let bootstrap = load_bootstrap(bootstrap)?;
    Ok(build_stack(&stack_config, &bootstrap)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_secrets() {
        let config = parse_bootstrap(
            r#"
namespace: gitops
credentials:
  - name: app-token
    type: token
    token: ghp_inline
"#,
        )
        .unwrap();
        assert_eq!(config.namespace, "gitops");
        assert_eq!(config.credentials.len(), 1);
        assert_eq!(config.credentials[0].credential_type, CredentialType::Token);
        assert_eq!(config.credentials[0].fields.token.as_deref(), Some("ghp_inline"));
    }

    #[test]
    fn test_secret_from_env() {
        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var("BASECAMP_TEST_SSH_KEY", "-----BEGIN KEY-----") };
        let config = parse_bootstrap(
            r#"
credentials:
  - name: deploy-key
    type: ssh
    privateKey:
      fromEnv: BASECAMP_TEST_SSH_KEY
    knownHosts: github.com ssh-ed25519 AAAA
"#,
        )
        .unwrap();
        let fields = &config.credentials[0].fields;
        assert_eq!(fields.private_key.as_deref(), Some("-----BEGIN KEY-----"));
        assert_eq!(fields.known_hosts.as_deref(), Some("github.com ssh-ed25519 AAAA"));
    }

    #[test]
    fn test_missing_env_secret_is_config_error() {
        let err = parse_bootstrap(
            r#"
credentials:
  - name: app-token
    type: token
    token:
      fromEnv: BASECAMP_TEST_DEFINITELY_UNSET
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
        assert!(err.to_string().contains("BASECAMP_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_no_bootstrap_file_is_default() {
        let config = load_bootstrap(None).unwrap();
        assert_eq!(config, BootstrapConfig::default());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let err = load_environments(Some(Path::new("/nonexistent/environments.yaml"))).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
