use tracing::{error, info, warn};

use crate::error::SquallError;
use crate::instance::InstanceProvider;
use crate::sink::{AttachRecord, TopologySink};
use crate::topology::{discover_with_warnings, Discovery};

/// Result of an attach. The host-list write is best effort, so callers get
/// the discovery either way and `persisted` says whether the files are current.
#[derive(Debug)]
pub struct AttachOutcome {
    pub discovery: Discovery,
    pub persisted: bool,
}

/// List the provider's instances, rebuild the cluster topology and write it
/// through `sink`.
///
/// A provider failure is returned. A sink failure is only logged: the
/// previous files may be stale afterwards.
pub fn attach(
    cluster: &str,
    provider: &dyn InstanceProvider,
    sink: &dyn TopologySink,
) -> Result<AttachOutcome, SquallError> {
    attach_with(cluster, provider, sink, false)
}

/// Like [`attach`], but the discovery must pass [`Discovery::validate`]
/// before anything is written. A rejected cluster leaves the previous files
/// untouched.
pub fn attach_strict(
    cluster: &str,
    provider: &dyn InstanceProvider,
    sink: &dyn TopologySink,
) -> Result<AttachOutcome, SquallError> {
    attach_with(cluster, provider, sink, true)
}

fn attach_with(
    cluster: &str,
    provider: &dyn InstanceProvider,
    sink: &dyn TopologySink,
    strict: bool,
) -> Result<AttachOutcome, SquallError> {
    let instances = provider.list_instances()?;
    info!(cluster = cluster, instances = instances.len(), "listed provider instances");

    let discovery = discover_with_warnings(cluster, &instances);
    for warning in &discovery.warnings {
        warn!(cluster = cluster, "{}", warning);
    }
    if strict {
        discovery.validate()?;
    }

    let record = AttachRecord::from_topology(&discovery.topology);
    let persisted = match sink.persist(&record) {
        Ok(()) => {
            info!(cluster = cluster, "Attached to cluster");
            true
        }
        Err(e) => {
            error!(cluster = cluster, "Problem attaching to cluster: {}", e);
            false
        }
    };

    Ok(AttachOutcome {
        discovery,
        persisted,
    })
}
