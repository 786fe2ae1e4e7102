use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::SquallError;
use crate::instance::InstanceProvider;

/// Everything read from `config.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub deployment: DeploymentConfiguration,
    pub credential: Credential,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// User toggles and locations for one deployment
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentConfiguration {
    /// Provider region or zone the cluster runs in
    pub region: String,
    /// Download location of the stream-processing release
    pub primary_url: String,
    /// Download location of the coordination-service release
    pub coordination_url: String,
    /// Login user on the instances; empty means the provider's default
    #[serde(default)]
    pub image_user: String,
    pub ssh_key: String,
    #[serde(default)]
    pub pre_config: Vec<String>,
    #[serde(default)]
    pub post_config: Vec<String>,
    #[serde(default)]
    pub memory_monitor: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "lambda".to_string()
}

impl DeploymentConfiguration {
    pub fn execute_memory_monitor(&self) -> bool {
        self.memory_monitor
    }

    /// Fill in `image_user` from the provider when the config leaves it unset
    pub fn resolve_image_user(&mut self, provider: &dyn InstanceProvider) -> Result<(), SquallError> {
        if self.image_user.trim().is_empty() {
            self.image_user = provider.get_user()?;
        }
        Ok(())
    }
}

/// Cloud access keys, plus the optional certificate pair used by the
/// image bundling tools.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Credential {
    pub identity: String,
    pub secret: String,
    #[serde(default)]
    pub certificate_path: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePair {
    pub certificate_path: String,
    pub private_key_path: String,
}

impl Credential {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Credential {
            identity: identity.into(),
            secret: secret.into(),
            certificate_path: None,
            private_key_path: None,
        }
    }

    pub fn with_certificate(mut self, certificate_path: impl Into<String>, private_key_path: impl Into<String>) -> Self {
        self.certificate_path = Some(certificate_path.into());
        self.private_key_path = Some(private_key_path.into());
        self
    }

    /// The certificate pair, only when both halves are set and non-empty.
    /// A lone certificate or key counts as no certificate at all.
    pub fn certificate(&self) -> Option<CertificatePair> {
        let certificate_path = self.certificate_path.as_deref().filter(|p| !p.is_empty())?;
        let private_key_path = self.private_key_path.as_deref().filter(|p| !p.is_empty())?;
        Some(CertificatePair {
            certificate_path: certificate_path.to_string(),
            private_key_path: private_key_path.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub region: Option<String>,
    /// Override for the provider's API base URL
    pub endpoint: Option<String>,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, SquallError> {
        toml::from_str(content)
            .map_err(|e| SquallError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, SquallError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SquallError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Get a specific provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
