use serde::{Deserialize, Serialize};

/// Backend endpoint configuration for a descriptor. Values are immutable once
/// built; credential migration produces a new config rather than mutating in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_endpoint_type")]
    pub endpoint_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<EndpointSecurity>,
}

fn default_endpoint_type() -> String {
    "http".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSecurity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<SecurityBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SecurityBlock>,
}

impl EndpointSecurity {
    pub fn block(&self, environment: Environment) -> Option<&SecurityBlock> {
        match environment {
            Environment::Production => self.production.as_ref(),
            Environment::Sandbox => self.sandbox.as_ref(),
        }
    }
}

/// Per-environment backend credentials. On input `client_secret` may be
/// plaintext; once persisted it is always ciphertext. `custom_parameters` is
/// normalized to a single JSON-encoded string before persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityBlock {
    #[serde(default)]
    pub kind: SecurityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityKind {
    #[default]
    None,
    Basic,
    Oauth,
}

impl SecurityKind {
    /// Whether this security type cannot be persisted without a credential.
    pub fn requires_secret(&self) -> bool {
        matches!(self, SecurityKind::Oauth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Sandbox => write!(f, "sandbox"),
        }
    }
}
