//! Local host-list files written on attach.
//!
//! These files are a convenience for later commands and are never read back
//! as a source of truth; discovery always starts from the provider.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SquallError;
use crate::topology::Topology;

const COORDINATION_FILE: &str = "coordination";
const WORKERS_FILE: &str = "workers";
const MASTER_FILE: &str = "master";
const UI_FILE: &str = "ui";

/// What gets written for one cluster. `ui` is empty when the cluster has no
/// UI node, `master` is empty when no master was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachRecord {
    pub cluster: String,
    pub coordination: Vec<String>,
    pub workers: Vec<String>,
    pub master: String,
    pub ui: String,
}

impl AttachRecord {
    pub fn from_topology(topology: &Topology) -> Self {
        let hostnames = topology.hostnames();
        AttachRecord {
            cluster: topology.cluster.clone(),
            coordination: hostnames.coordination,
            workers: hostnames.workers,
            master: hostnames.master,
            ui: hostnames.ui,
        }
    }
}

pub trait TopologySink {
    fn persist(&self, record: &AttachRecord) -> Result<(), SquallError>;
}

/// Writes one directory per cluster under `root`
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSink { root: root.into() }
    }

    /// Sink rooted at `~/.squall`
    pub fn in_home() -> Result<Self, SquallError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SquallError::from("Unable to determine home directory"))?;
        Ok(FileSink::new(home.join(".squall")))
    }

    pub fn cluster_dir(&self, cluster: &str) -> PathBuf {
        self.root.join(cluster)
    }

    /// Read back what the last attach wrote
    pub fn load(&self, cluster: &str) -> Result<AttachRecord, SquallError> {
        let dir = self.cluster_dir(cluster);
        Ok(AttachRecord {
            cluster: cluster.to_string(),
            coordination: read_lines(&dir.join(COORDINATION_FILE))?,
            workers: read_lines(&dir.join(WORKERS_FILE))?,
            master: read_single(&dir.join(MASTER_FILE))?,
            ui: read_single(&dir.join(UI_FILE))?,
        })
    }
}

impl TopologySink for FileSink {
    fn persist(&self, record: &AttachRecord) -> Result<(), SquallError> {
        let dir = self.cluster_dir(&record.cluster);
        fs::create_dir_all(&dir).map_err(|e| {
            SquallError::from(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        write_file(&dir.join(COORDINATION_FILE), &lines(&record.coordination))?;
        write_file(&dir.join(WORKERS_FILE), &lines(&record.workers))?;
        write_file(&dir.join(MASTER_FILE), &format!("{}\n", record.master))?;
        write_file(&dir.join(UI_FILE), &format!("{}\n", record.ui))
    }
}

fn lines(values: &[String]) -> String {
    values.iter().map(|v| format!("{}\n", v)).collect()
}

fn write_file(path: &Path, content: &str) -> Result<(), SquallError> {
    fs::write(path, content)
        .map_err(|e| SquallError::from(format!("Failed to write {}: {}", path.display(), e)))
}

fn read_lines(path: &Path) -> Result<Vec<String>, SquallError> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .collect())
}

fn read_single(path: &Path) -> Result<String, SquallError> {
    let content = fs::read_to_string(path)?;
    Ok(content.trim().to_string())
}
