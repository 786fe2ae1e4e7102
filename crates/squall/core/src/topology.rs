//! Topology discovery
//!
//! Rebuilds the role assignment of a cluster from the provider's live instance
//! listing. Nothing cached locally is consulted: every call starts from the
//! instances it is handed and produces a fresh [`Topology`].

use std::fmt;

use tracing::{debug, warn};

use crate::error::SquallError;
use crate::instance::{address_of, addresses, Instance};
use crate::role::{Role, RoleSet};

/// Role assignment of one cluster at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub cluster: String,
    pub master: Option<Instance>,
    pub ui: Option<Instance>,
    pub coordination_nodes: Vec<Instance>,
    pub worker_nodes: Vec<Instance>,
    pub rpc_nodes: Vec<Instance>,
}

/// Something discovery noticed but resolved on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryWarning {
    /// A second instance claimed a single-instance role and was ignored for it
    DuplicateRole {
        role: Role,
        kept: String,
        dropped: String,
    },
    /// Instance belongs to the cluster but its role tag names no known role
    NoKnownRoles { instance: String, tag: String },
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryWarning::DuplicateRole { role, kept, dropped } => write!(
                f,
                "instance {} also claims role '{}', keeping {}",
                dropped, role, kept
            ),
            DiscoveryWarning::NoKnownRoles { instance, tag } => {
                write!(f, "instance {} has no known roles in tag '{}'", instance, tag)
            }
        }
    }
}

/// Topology plus the warnings raised while building it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub topology: Topology,
    pub warnings: Vec<DiscoveryWarning>,
}

/// Resolved addresses per role, as consumed by the sink and the plan builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleHostnames {
    pub master: String,
    pub ui: String,
    pub coordination: Vec<String>,
    pub workers: Vec<String>,
    pub rpc: Vec<String>,
}

/// Discover the topology of `cluster` from a provider listing.
///
/// Warnings are logged and otherwise dropped; use
/// [`discover_with_warnings`] to inspect them.
pub fn discover(cluster: &str, instances: &[Instance]) -> Topology {
    let discovery = discover_with_warnings(cluster, instances);
    for warning in &discovery.warnings {
        warn!(cluster = cluster, "{}", warning);
    }
    discovery.topology
}

pub fn discover_with_warnings(cluster: &str, instances: &[Instance]) -> Discovery {
    let mut topology = Topology {
        cluster: cluster.to_string(),
        ..Topology::default()
    };
    let mut warnings = Vec::new();

    for instance in instances {
        if instance.is_terminated() || !instance.in_group(cluster) {
            continue;
        }
        let Some(tag) = instance.role_tag() else {
            continue;
        };

        let roles = instance.roles();
        if roles.is_empty() {
            warnings.push(DiscoveryWarning::NoKnownRoles {
                instance: instance.id.clone(),
                tag: tag.to_string(),
            });
            continue;
        }
        debug!(instance = %instance.id, roles = %roles, "classified instance");

        topology.assign(instance, &roles, &mut warnings);
    }

    Discovery { topology, warnings }
}

impl Topology {
    fn assign(&mut self, instance: &Instance, roles: &RoleSet, warnings: &mut Vec<DiscoveryWarning>) {
        for role in roles.iter() {
            match role {
                Role::Master => claim_single(&mut self.master, instance, role, warnings),
                Role::Ui => claim_single(&mut self.ui, instance, role, warnings),
                Role::Worker => self.worker_nodes.push(instance.clone()),
                Role::Coordination => self.coordination_nodes.push(instance.clone()),
                Role::Rpc => self.rpc_nodes.push(instance.clone()),
            }
        }
    }

    /// True when no instance of the cluster was found
    pub fn is_empty(&self) -> bool {
        self.master.is_none()
            && self.ui.is_none()
            && self.coordination_nodes.is_empty()
            && self.worker_nodes.is_empty()
            && self.rpc_nodes.is_empty()
    }

    pub fn hostnames(&self) -> RoleHostnames {
        RoleHostnames {
            master: address_of(self.master.as_ref()),
            ui: address_of(self.ui.as_ref()),
            coordination: addresses(&self.coordination_nodes),
            workers: addresses(&self.worker_nodes),
            rpc: addresses(&self.rpc_nodes),
        }
    }

    /// Every distinct member instance with the roles it holds here, in
    /// order of first appearance.
    pub fn members(&self) -> Vec<(&Instance, RoleSet)> {
        let mut members: Vec<(&Instance, RoleSet)> = Vec::new();
        let slots = self
            .master
            .iter()
            .map(|i| (i, Role::Master))
            .chain(self.worker_nodes.iter().map(|i| (i, Role::Worker)))
            .chain(self.coordination_nodes.iter().map(|i| (i, Role::Coordination)))
            .chain(self.ui.iter().map(|i| (i, Role::Ui)))
            .chain(self.rpc_nodes.iter().map(|i| (i, Role::Rpc)));

        for (instance, role) in slots {
            match members.iter_mut().find(|(m, _)| m.id == instance.id) {
                Some((_, roles)) => {
                    roles.insert(role);
                }
                None => members.push((instance, [role].into_iter().collect())),
            }
        }
        members
    }

    /// Roles held by the member whose address is `address`
    pub fn roles_at(&self, address: &str) -> Option<RoleSet> {
        self.members()
            .into_iter()
            .find(|(instance, _)| instance.address.as_deref() == Some(address))
            .map(|(_, roles)| roles)
    }
}

impl Discovery {
    /// Strict check used when a caller needs a deployable cluster: a master
    /// must be present and no single-instance role may have been contested.
    pub fn validate(&self) -> Result<(), SquallError> {
        let cluster = &self.topology.cluster;
        if self.topology.master.is_none() {
            return Err(SquallError::from(format!(
                "Cluster '{}' has no running master instance",
                cluster
            )));
        }
        let contested: Vec<String> = self
            .warnings
            .iter()
            .filter(|w| matches!(w, DiscoveryWarning::DuplicateRole { .. }))
            .map(|w| w.to_string())
            .collect();
        if !contested.is_empty() {
            return Err(SquallError::from(format!(
                "Cluster '{}' has conflicting role assignments: {}",
                cluster,
                contested.join("; ")
            )));
        }
        Ok(())
    }
}

fn claim_single(
    slot: &mut Option<Instance>,
    instance: &Instance,
    role: Role,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    match slot {
        Some(kept) => warnings.push(DiscoveryWarning::DuplicateRole {
            role,
            kept: kept.id.clone(),
            dropped: instance.id.clone(),
        }),
        None => *slot = Some(instance.clone()),
    }
}
