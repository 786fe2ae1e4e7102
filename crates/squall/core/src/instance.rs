use std::collections::BTreeMap;

use crate::error::SquallError;
use crate::role::{classify, RoleSet, ROLE_TAG_KEY};

/// Lifecycle state reported by the cloud provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Active,
    Terminated,
    Other(String),
}

impl InstanceStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "active" => InstanceStatus::Active,
            "terminated" => InstanceStatus::Terminated,
            other => InstanceStatus::Other(other.to_string()),
        }
    }
}

/// A cloud instance as listed by the provider. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub status: InstanceStatus,
    /// Cluster name the instance was launched for
    pub group: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub address: Option<String>,
}

impl Instance {
    pub fn new(id: impl Into<String>, status: InstanceStatus) -> Self {
        Instance {
            id: id.into(),
            status,
            group: None,
            tags: BTreeMap::new(),
            address: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Raw role tag, if the instance has one
    pub fn role_tag(&self) -> Option<&str> {
        self.tags.get(ROLE_TAG_KEY).map(String::as_str)
    }

    pub fn roles(&self) -> RoleSet {
        self.role_tag().map(classify).unwrap_or_default()
    }

    pub fn is_terminated(&self) -> bool {
        self.status == InstanceStatus::Terminated
    }

    /// Whether the instance was launched for `cluster`, ignoring case
    pub fn in_group(&self, cluster: &str) -> bool {
        self.group
            .as_deref()
            .is_some_and(|group| group.to_lowercase() == cluster.to_lowercase())
    }
}

/// Source of live instance state. Implemented per cloud provider.
pub trait InstanceProvider {
    fn list_instances(&self) -> Result<Vec<Instance>, SquallError>;
    /// Login user of the provider's stock images
    fn get_user(&self) -> Result<String, SquallError>;
}

/// Resolved address of an optional instance, empty when absent
pub fn address_of(instance: Option<&Instance>) -> String {
    instance
        .and_then(|i| i.address.clone())
        .unwrap_or_default()
}

pub fn addresses(instances: &[Instance]) -> Vec<String> {
    instances
        .iter()
        .map(|i| i.address.clone().unwrap_or_default())
        .collect()
}
