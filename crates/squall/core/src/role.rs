//! Cluster roles and the parser for the per-instance role tag.
//!
//! Instances carry their roles under the [`ROLE_TAG_KEY`] tag as a
//! comma-separated list, optionally wrapped in brackets: `[master, zk]` or
//! `worker,ui`. Parsing ignores case, whitespace and unknown tokens.

use std::collections::BTreeSet;
use std::fmt;

/// Tag key under which an instance lists its roles.
pub const ROLE_TAG_KEY: &str = "daemons";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Coordinates task assignment, one per cluster
    Master,
    /// Runs assigned processing tasks
    Worker,
    /// Member of the coordination ensemble
    Coordination,
    /// Hosts the status web interface
    Ui,
    /// Remote procedure entry point
    Rpc,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Master,
        Role::Worker,
        Role::Coordination,
        Role::Ui,
        Role::Rpc,
    ];

    /// Token used for this role in the instance tag
    pub fn tag(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Worker => "worker",
            Role::Coordination => "zk",
            Role::Ui => "ui",
            Role::Rpc => "drpc",
        }
    }

    /// Match a single, already-normalized token
    pub fn from_tag(token: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.tag() == token)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Normalized set of roles held by one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().map(|role| role.tag()).collect();
        write!(f, "[{}]", tags.join(", "))
    }
}

/// Parse a role tag value into the set of roles it names.
///
/// Never fails: unknown tokens are skipped so newer role names don't break
/// older tooling, and an empty value yields an empty set.
pub fn classify(tag_value: &str) -> RoleSet {
    tag_value
        .replace(['[', ']'], "")
        .split(',')
        .filter_map(|token| Role::from_tag(&token.trim().to_lowercase()))
        .collect()
}
