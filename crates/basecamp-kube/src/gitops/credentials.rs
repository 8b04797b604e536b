//! Git credentials
//!
//! A credential is written as a `type` plus loose optional fields. It is
//! checked once into a [`GitAuth`] variant, which carries exactly the fields
//! its secret shape needs:
//!
//! | type    | secret data                                  |
//! |---------|----------------------------------------------|
//! | `token` | `username: git`, `password: <token>`         |
//! | `ssh`   | `identity`, `identity.pub`, `known_hosts`    |
//! | `basic` | `username`, `password`                       |

use basecamp_core::{CoreError, Result, validate_object_name};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Username Git hosts expect alongside a personal access token
const TOKEN_USERNAME: &str = "git";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    Token,
    Ssh,
    Basic,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::Token => "token",
            CredentialType::Ssh => "ssh",
            CredentialType::Basic => "basic",
        }
    }
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credential fields as written; which ones are required depends on the type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<String>,
}

/// A credential entry of a bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSpec {
    pub name: String,

    /// Secret namespace; sources only read secrets from their own namespace,
    /// so when set it must name the controller namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(rename = "type")]
    pub credential_type: CredentialType,

    #[serde(flatten)]
    pub fields: CredentialFields,
}

/// Validated authentication material
#[derive(Clone, PartialEq, Eq)]
pub enum GitAuth {
    Token {
        token: String,
    },
    Ssh {
        private_key: String,
        known_hosts: Option<String>,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl GitAuth {
    /// Pick the variant for `credential_type`; fails when a required field is missing
    pub fn from_fields(
        resource: &str,
        credential_type: CredentialType,
        fields: &CredentialFields,
    ) -> Result<Self> {
        let require = |value: &Option<String>, field: &str| -> Result<String> {
            match value.as_deref() {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(CoreError::validation(
                    resource,
                    format!("{} credentials require '{}'", credential_type, field),
                )),
            }
        };

        Ok(match credential_type {
            CredentialType::Token => GitAuth::Token {
                token: require(&fields.token, "token")?,
            },
            CredentialType::Ssh => GitAuth::Ssh {
                private_key: require(&fields.private_key, "privateKey")?,
                known_hosts: fields.known_hosts.clone(),
            },
            CredentialType::Basic => GitAuth::Basic {
                username: require(&fields.username, "username")?,
                password: require(&fields.password, "password")?,
            },
        })
    }

    pub fn credential_type(&self) -> CredentialType {
        match self {
            GitAuth::Token { .. } => CredentialType::Token,
            GitAuth::Ssh { .. } => CredentialType::Ssh,
            GitAuth::Basic { .. } => CredentialType::Basic,
        }
    }

    /// Secret `stringData` for this variant
    pub fn string_data(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            GitAuth::Token { token } => vec![
                ("username", TOKEN_USERNAME.to_string()),
                ("password", token.clone()),
            ],
            GitAuth::Ssh {
                private_key,
                known_hosts,
            } => vec![
                ("identity", private_key.clone()),
                ("identity.pub", String::new()),
                ("known_hosts", known_hosts.clone().unwrap_or_default()),
            ],
            GitAuth::Basic { username, password } => vec![
                ("username", username.clone()),
                ("password", password.clone()),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

// Never print secret material
impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GitAuth::{}(..)", self.credential_type())
    }
}

/// A validated credential, materialized as one Opaque secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCredential {
    pub name: String,
    pub namespace: Option<String>,
    pub auth: GitAuth,
}

impl GitCredential {
    pub fn from_spec(spec: &CredentialSpec) -> Result<Self> {
        let resource = format!("credential '{}'", spec.name);
        validate_object_name(&resource, &spec.name)?;
        if let Some(namespace) = &spec.namespace {
            validate_object_name(&resource, namespace)?;
        }
        Ok(Self {
            name: spec.name.clone(),
            namespace: spec.namespace.clone(),
            auth: GitAuth::from_fields(&resource, spec.credential_type, &spec.fields)?,
        })
    }

    pub fn token(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            auth: GitAuth::Token {
                token: token.into(),
            },
        }
    }

    pub fn ssh(
        name: impl Into<String>,
        private_key: impl Into<String>,
        known_hosts: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            auth: GitAuth::Ssh {
                private_key: private_key.into(),
                known_hosts,
            },
        }
    }

    pub fn basic(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            auth: GitAuth::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Stable resource name: `<stack>-flux-<name>-<type>-secret`
    pub fn resource_name(&self, stack: &str) -> String {
        format!("{}-flux-{}-{}-secret", stack, self.name, self.auth.credential_type())
    }

    pub fn secret(&self, default_namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(
                    self.namespace
                        .clone()
                        .unwrap_or_else(|| default_namespace.to_string()),
                ),
                ..ObjectMeta::default()
            },
            type_: Some("Opaque".to_string()),
            string_data: Some(self.auth.string_data()),
            ..Secret::default()
        }
    }
}
