//! Deployment plan builder
//!
//! A plan is the ordered list of provisioning steps that turns a fresh
//! instance into a configured cluster member. The order and the inclusion
//! rules live in [`STEP_TABLE`]; building a plan walks the table once,
//! keeps the entries whose guard holds and asks the [`Toolchain`] for each
//! step's statements.
//!
//! Every node receives the same plan. Which daemons stay up on a node is
//! decided on the node itself from the roles file that
//! [`Plan::to_node_script`] writes ahead of the steps, never here.

use std::fmt;

use crate::config::{Credential, DeploymentConfiguration};
use crate::error::SquallError;
use crate::role::RoleSet;
use crate::toolchain::{Daemon, ShellToolchain, Toolchain};

/// One opaque, remotely executable command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement(String);

impl Statement {
    pub fn new(command: impl Into<String>) -> Self {
        Statement(command.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dependency rank. Steps in a plan never go back to an earlier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Bootstrap,
    Credentials,
    Tooling,
    Install,
    PreConfig,
    Configure,
    PostConfig,
    Start,
    Auxiliary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepId {
    PackageBootstrap,
    CloudCredentials,
    StorageCli,
    CertificateTools,
    Messaging,
    DeploymentAgent,
    PrimaryDownload,
    CoordinationDownload,
    MonitoringInstall,
    PreConfigHooks,
    CoordinationConfig,
    PrimaryConfig,
    MonitoringConfig,
    PostConfigHooks,
    StartCoordination,
    StartMaster,
    StartWorker,
    StartUi,
    StartRpc,
    StartLogViewer,
    StartMonitoring,
    MemoryMonitor,
}

impl StepId {
    pub fn name(&self) -> &'static str {
        match self {
            StepId::PackageBootstrap => "package-bootstrap",
            StepId::CloudCredentials => "cloud-credentials",
            StepId::StorageCli => "storage-cli",
            StepId::CertificateTools => "certificate-tools",
            StepId::Messaging => "messaging",
            StepId::DeploymentAgent => "deployment-agent",
            StepId::PrimaryDownload => "primary-download",
            StepId::CoordinationDownload => "coordination-download",
            StepId::MonitoringInstall => "monitoring-install",
            StepId::PreConfigHooks => "pre-config-hooks",
            StepId::CoordinationConfig => "coordination-config",
            StepId::PrimaryConfig => "primary-config",
            StepId::MonitoringConfig => "monitoring-config",
            StepId::PostConfigHooks => "post-config-hooks",
            StepId::StartCoordination => "start-coordination",
            StepId::StartMaster => "start-master",
            StepId::StartWorker => "start-worker",
            StepId::StartUi => "start-ui",
            StepId::StartRpc => "start-rpc",
            StepId::StartLogViewer => "start-logviewer",
            StepId::StartMonitoring => "start-monitoring",
            StepId::MemoryMonitor => "memory-monitor",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of everything a plan is built from
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub cluster: &'a str,
    pub credential: &'a Credential,
    pub config: &'a DeploymentConfiguration,
    pub coordination_hosts: &'a [String],
    pub rpc_hosts: &'a [String],
    pub master: &'a str,
    pub ui: &'a str,
}

pub struct StepDescriptor {
    pub id: StepId,
    pub phase: Phase,
    pub guard: fn(&PlanInputs) -> bool,
    pub render: fn(&PlanInputs, &dyn Toolchain) -> Vec<Statement>,
}

fn always(_: &PlanInputs) -> bool {
    true
}

fn has_certificate(inputs: &PlanInputs) -> bool {
    inputs.credential.certificate().is_some()
}

fn has_pre_config(inputs: &PlanInputs) -> bool {
    !inputs.config.pre_config.is_empty()
}

fn has_post_config(inputs: &PlanInputs) -> bool {
    !inputs.config.post_config.is_empty()
}

fn memory_monitor_enabled(inputs: &PlanInputs) -> bool {
    inputs.config.execute_memory_monitor()
}

fn concat(parts: Vec<Vec<Statement>>) -> Vec<Statement> {
    parts.into_iter().flatten().collect()
}

fn certificate_tools(inputs: &PlanInputs, tools: &dyn Toolchain) -> Vec<Statement> {
    // guarded by has_certificate, so the pair is present here
    let Some(pair) = inputs.credential.certificate() else {
        return Vec::new();
    };
    concat(vec![
        tools.install_certificate_tools(),
        tools.configure_certificate_tools(&pair, &inputs.config.region, inputs.cluster),
    ])
}

fn deployment_agent(inputs: &PlanInputs, tools: &dyn Toolchain) -> Vec<Statement> {
    concat(vec![
        tools.download_agent(),
        tools.write_agent_config(inputs.config, inputs.credential),
        tools.write_local_ssh_keys(&inputs.config.image_user, &inputs.config.ssh_key),
    ])
}

fn start(daemon: Daemon, inputs: &PlanInputs, tools: &dyn Toolchain) -> Vec<Statement> {
    tools.start_supervised(daemon, &inputs.config.image_user)
}

/// Every step a plan can contain, in execution order.
pub static STEP_TABLE: [StepDescriptor; 22] = [
    StepDescriptor {
        id: StepId::PackageBootstrap,
        phase: Phase::Bootstrap,
        guard: always,
        render: |_, tools| tools.bootstrap_packages(),
    },
    StepDescriptor {
        id: StepId::CloudCredentials,
        phase: Phase::Credentials,
        guard: always,
        render: |inputs, tools| tools.configure_cloud_credentials(&inputs.config.region, inputs.credential),
    },
    StepDescriptor {
        id: StepId::StorageCli,
        phase: Phase::Tooling,
        guard: always,
        render: |inputs, tools| {
            concat(vec![
                tools.install_storage_cli(),
                tools.configure_storage_cli(inputs.credential),
            ])
        },
    },
    StepDescriptor {
        id: StepId::CertificateTools,
        phase: Phase::Tooling,
        guard: has_certificate,
        render: certificate_tools,
    },
    StepDescriptor {
        id: StepId::Messaging,
        phase: Phase::Tooling,
        guard: always,
        render: |_, tools| concat(vec![tools.download_messaging(), tools.configure_messaging()]),
    },
    StepDescriptor {
        id: StepId::DeploymentAgent,
        phase: Phase::Tooling,
        guard: always,
        render: deployment_agent,
    },
    StepDescriptor {
        id: StepId::PrimaryDownload,
        phase: Phase::Install,
        guard: always,
        render: |inputs, tools| tools.download_primary(&inputs.config.primary_url),
    },
    StepDescriptor {
        id: StepId::CoordinationDownload,
        phase: Phase::Install,
        guard: always,
        render: |inputs, tools| tools.download_coordination(&inputs.config.coordination_url),
    },
    StepDescriptor {
        id: StepId::MonitoringInstall,
        phase: Phase::Install,
        guard: always,
        render: |_, tools| tools.install_monitoring(),
    },
    StepDescriptor {
        id: StepId::PreConfigHooks,
        phase: Phase::PreConfig,
        guard: has_pre_config,
        render: |inputs, tools| tools.run_custom_commands(&inputs.config.pre_config),
    },
    StepDescriptor {
        id: StepId::CoordinationConfig,
        phase: Phase::Configure,
        guard: always,
        render: |inputs, tools| tools.configure_coordination(inputs.coordination_hosts),
    },
    StepDescriptor {
        id: StepId::PrimaryConfig,
        phase: Phase::Configure,
        guard: always,
        render: |inputs, tools| {
            tools.configure_primary(
                inputs.master,
                inputs.coordination_hosts,
                inputs.rpc_hosts,
                &inputs.config.image_user,
            )
        },
    },
    StepDescriptor {
        id: StepId::MonitoringConfig,
        phase: Phase::Configure,
        guard: always,
        render: |inputs, tools| tools.configure_monitoring(inputs.cluster, inputs.ui),
    },
    StepDescriptor {
        id: StepId::PostConfigHooks,
        phase: Phase::PostConfig,
        guard: has_post_config,
        render: |inputs, tools| tools.run_custom_commands(&inputs.config.post_config),
    },
    StepDescriptor {
        id: StepId::StartCoordination,
        phase: Phase::Start,
        guard: always,
        render: |inputs, tools| start(Daemon::Coordination, inputs, tools),
    },
    StepDescriptor {
        id: StepId::StartMaster,
        phase: Phase::Start,
        guard: always,
        render: |inputs, tools| start(Daemon::Master, inputs, tools),
    },
    StepDescriptor {
        id: StepId::StartWorker,
        phase: Phase::Start,
        guard: always,
        render: |inputs, tools| start(Daemon::Worker, inputs, tools),
    },
    StepDescriptor {
        id: StepId::StartUi,
        phase: Phase::Start,
        guard: always,
        render: |inputs, tools| start(Daemon::Ui, inputs, tools),
    },
    StepDescriptor {
        id: StepId::StartRpc,
        phase: Phase::Start,
        guard: always,
        render: |inputs, tools| start(Daemon::Rpc, inputs, tools),
    },
    StepDescriptor {
        id: StepId::StartLogViewer,
        phase: Phase::Start,
        guard: always,
        render: |inputs, tools| start(Daemon::LogViewer, inputs, tools),
    },
    StepDescriptor {
        id: StepId::StartMonitoring,
        phase: Phase::Start,
        guard: always,
        render: |_, tools| tools.start_monitoring(),
    },
    StepDescriptor {
        id: StepId::MemoryMonitor,
        phase: Phase::Auxiliary,
        guard: memory_monitor_enabled,
        render: |inputs, tools| tools.run_memory_monitor(&inputs.config.image_user),
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningStep {
    pub id: StepId,
    pub phase: Phase,
    pub statements: Vec<Statement>,
}

/// Ordered provisioning steps for one node. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<ProvisioningStep>,
}

impl Plan {
    pub fn steps(&self) -> &[ProvisioningStep] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id).collect()
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// All statements flattened in execution order
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.steps.iter().flat_map(|s| s.statements.iter())
    }

    /// Check that steps follow table order and never fall back a phase
    pub fn check_order(&self) -> Result<(), SquallError> {
        for pair in self.steps.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.phase < prev.phase || next.id <= prev.id {
                return Err(SquallError::from(format!(
                    "step '{}' ({:?}) must not follow '{}' ({:?})",
                    next.id, next.phase, prev.id, prev.phase
                )));
            }
        }
        Ok(())
    }

    /// Render as a bash script that stops at the first failing statement
    pub fn to_script(&self) -> String {
        self.render(&[])
    }

    /// Render the script one node runs: its roles file first, then the
    /// shared steps unchanged.
    pub fn to_node_script(&self, roles: &RoleSet, tools: &dyn Toolchain) -> String {
        self.render(&tools.write_node_roles(roles))
    }

    fn render(&self, preamble: &[Statement]) -> String {
        let mut script = String::from("#!/bin/bash\nset -e\n");
        if !preamble.is_empty() {
            push_section(&mut script, "node-roles", preamble);
        }
        for step in &self.steps {
            push_section(&mut script, step.id.name(), &step.statements);
        }
        script
    }
}

fn push_section(script: &mut String, name: &str, statements: &[Statement]) {
    script.push_str(&format!("\n# --- {} ---\n", name));
    for statement in statements {
        script.push_str(statement.as_str());
        script.push('\n');
    }
}

/// Build the provisioning plan with the default shell toolchain.
///
/// Never fails. Empty hostnames are passed through to the toolchain as-is.
pub fn build_plan(
    cluster: &str,
    credential: &Credential,
    config: &DeploymentConfiguration,
    coordination_hosts: &[String],
    rpc_hosts: &[String],
    master: &str,
    ui: &str,
) -> Plan {
    let inputs = PlanInputs {
        cluster,
        credential,
        config,
        coordination_hosts,
        rpc_hosts,
        master,
        ui,
    };
    build_plan_with(&inputs, &ShellToolchain)
}

pub fn build_plan_with(inputs: &PlanInputs, tools: &dyn Toolchain) -> Plan {
    let steps = STEP_TABLE
        .iter()
        .filter(|descriptor| (descriptor.guard)(inputs))
        .map(|descriptor| ProvisioningStep {
            id: descriptor.id,
            phase: descriptor.phase,
            statements: (descriptor.render)(inputs, tools),
        })
        .collect();
    Plan { steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CertificatePair;
    use crate::role::Role;

    fn config() -> DeploymentConfiguration {
        DeploymentConfiguration {
            region: "us-east-1".into(),
            primary_url: "https://a/stream.tar.gz".into(),
            coordination_url: "https://a/coord.tar.gz".into(),
            image_user: "ubuntu".into(),
            ssh_key: "deploy".into(),
            pre_config: Vec::new(),
            post_config: Vec::new(),
            memory_monitor: false,
            provider: "lambda".into(),
        }
    }

    fn hosts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn plan(credential: &Credential, config: &DeploymentConfiguration) -> Plan {
        build_plan(
            "prod",
            credential,
            config,
            &hosts(&["10.0.0.1", "10.0.0.2"]),
            &hosts(&["10.0.0.3"]),
            "10.0.0.1",
            "10.0.0.4",
        )
    }

    /// Toolchain that renders every hook as a one-line marker naming it
    struct Recorder;

    fn mark(name: &str) -> Vec<Statement> {
        vec![Statement::new(name)]
    }

    impl Toolchain for Recorder {
        fn bootstrap_packages(&self) -> Vec<Statement> {
            mark("bootstrap")
        }

        fn configure_cloud_credentials(&self, region: &str, c: &Credential) -> Vec<Statement> {
            mark(&format!("creds {} {}", region, c.identity))
        }

        fn install_storage_cli(&self) -> Vec<Statement> {
            mark("storage-install")
        }

        fn configure_storage_cli(&self, _: &Credential) -> Vec<Statement> {
            mark("storage-configure")
        }

        fn install_certificate_tools(&self) -> Vec<Statement> {
            mark("cert-install")
        }

        fn configure_certificate_tools(&self, p: &CertificatePair, _: &str, cluster: &str) -> Vec<Statement> {
            mark(&format!("cert-configure {} {}", p.certificate_path, cluster))
        }

        fn download_messaging(&self) -> Vec<Statement> {
            mark("messaging-download")
        }

        fn configure_messaging(&self) -> Vec<Statement> {
            mark("messaging-configure")
        }

        fn download_agent(&self) -> Vec<Statement> {
            mark("agent-download")
        }

        fn write_agent_config(&self, _: &DeploymentConfiguration, _: &Credential) -> Vec<Statement> {
            mark("agent-config")
        }

        fn write_local_ssh_keys(&self, user: &str, key: &str) -> Vec<Statement> {
            mark(&format!("ssh-keys {} {}", user, key))
        }

        fn download_primary(&self, url: &str) -> Vec<Statement> {
            mark(&format!("primary-download {}", url))
        }

        fn download_coordination(&self, url: &str) -> Vec<Statement> {
            mark(&format!("coordination-download {}", url))
        }

        fn install_monitoring(&self) -> Vec<Statement> {
            mark("monitoring-install")
        }

        fn run_custom_commands(&self, commands: &[String]) -> Vec<Statement> {
            commands.iter().map(|c| Statement::new(c.as_str())).collect()
        }

        fn configure_coordination(&self, h: &[String]) -> Vec<Statement> {
            mark(&format!("coordination-configure {}", h.join(",")))
        }

        fn configure_primary(&self, m: &str, c: &[String], r: &[String], _: &str) -> Vec<Statement> {
            mark(&format!("primary-configure {} {} {}", m, c.join(","), r.join(",")))
        }

        fn configure_monitoring(&self, cluster: &str, ui: &str) -> Vec<Statement> {
            mark(&format!("monitoring-configure {} {}", cluster, ui))
        }

        fn start_supervised(&self, d: Daemon, _: &str) -> Vec<Statement> {
            mark(&format!("start {}", d.program()))
        }

        fn start_monitoring(&self) -> Vec<Statement> {
            mark("monitoring-start")
        }

        fn run_memory_monitor(&self, _: &str) -> Vec<Statement> {
            mark("memory-monitor")
        }

        fn write_node_roles(&self, roles: &RoleSet) -> Vec<Statement> {
            mark(&format!("roles {}", roles))
        }
    }

    #[test]
    fn test_step_table_is_ordered() {
        for pair in STEP_TABLE.windows(2) {
            assert!(pair[0].id < pair[1].id, "{} before {}", pair[0].id, pair[1].id);
            assert!(pair[0].phase <= pair[1].phase, "{} phase regresses", pair[1].id);
        }
    }

    #[test]
    fn test_minimal_plan_has_only_unconditional_steps() {
        let plan = plan(&Credential::new("id", "sec"), &config());

        assert_eq!(plan.steps().len(), 18);
        for id in [
            StepId::CertificateTools,
            StepId::PreConfigHooks,
            StepId::PostConfigHooks,
            StepId::MemoryMonitor,
        ] {
            assert!(!plan.contains(id), "{} should be absent", id);
        }
        assert!(plan.check_order().is_ok());
    }

    #[test]
    fn test_full_plan_has_every_step_in_table_order() {
        let mut config = config();
        config.pre_config = vec!["echo pre".into()];
        config.post_config = vec!["echo post".into()];
        config.memory_monitor = true;
        let credential = Credential::new("id", "sec").with_certificate("/c.pem", "/k.pem");

        let plan = plan(&credential, &config);
        let expected: Vec<StepId> = STEP_TABLE.iter().map(|d| d.id).collect();
        assert_eq!(plan.ids(), expected);
        assert!(plan.check_order().is_ok());
    }

    #[test]
    fn test_each_toggle_controls_only_its_step() {
        let base_config = config();
        let base_credential = Credential::new("id", "sec");
        let base = plan(&base_credential, &base_config);

        let with_cert = plan(&base_credential.clone().with_certificate("/c.pem", "/k.pem"), &base_config);
        let mut pre = base_config.clone();
        pre.pre_config = vec!["echo pre".into()];
        let mut post = base_config.clone();
        post.post_config = vec!["echo post".into()];
        let mut monitor = base_config.clone();
        monitor.memory_monitor = true;

        let cases = [
            (with_cert, StepId::CertificateTools),
            (plan(&base_credential, &pre), StepId::PreConfigHooks),
            (plan(&base_credential, &post), StepId::PostConfigHooks),
            (plan(&base_credential, &monitor), StepId::MemoryMonitor),
        ];
        for (toggled, id) in cases {
            assert!(toggled.contains(id));
            let mut remaining = toggled.ids();
            remaining.retain(|step| *step != id);
            assert_eq!(remaining, base.ids(), "toggling {} changed other steps", id);
        }
    }

    #[test]
    fn test_partial_certificate_omits_certificate_tools() {
        let mut credential = Credential::new("id", "sec");
        credential.certificate_path = Some("/c.pem".into());
        assert!(!plan(&credential, &config()).contains(StepId::CertificateTools));

        let credential = Credential::new("id", "sec").with_certificate("/c.pem", "");
        assert!(!plan(&credential, &config()).contains(StepId::CertificateTools));
    }

    #[test]
    fn test_ordering_invariant() {
        let mut config = config();
        config.memory_monitor = true;
        let plan = plan(&Credential::new("id", "sec"), &config);

        let position = |id| plan.position(id).unwrap();
        let credentials = position(StepId::CloudCredentials);
        let storage = position(StepId::StorageCli);
        let first_configure = position(StepId::CoordinationConfig);
        let last_configure = position(StepId::MonitoringConfig);
        let first_start = position(StepId::StartCoordination);
        let last_start = position(StepId::StartMonitoring);
        let monitor = position(StepId::MemoryMonitor);

        assert!(credentials < storage);
        assert!(storage < first_configure);
        assert!(last_configure < first_start);
        assert!(last_start < monitor);
        assert!(position(StepId::Messaging) < position(StepId::DeploymentAgent));
        assert!(position(StepId::CoordinationDownload) < first_configure);
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut config = config();
        config.pre_config = vec!["a".into(), "b".into()];
        let credential = Credential::new("id", "sec");
        assert_eq!(plan(&credential, &config), plan(&credential, &config));
        assert_eq!(
            plan(&credential, &config).to_script(),
            plan(&credential, &config).to_script()
        );
    }

    #[test]
    fn test_inputs_reach_the_toolchain() {
        let mut config = config();
        config.pre_config = vec!["first".into(), "second".into()];
        config.post_config = vec!["after".into()];
        let credential = Credential::new("AKIA", "sec").with_certificate("/c.pem", "/k.pem");
        let coordination = hosts(&["z1", "z2"]);
        let rpc = hosts(&["r1"]);
        let inputs = PlanInputs {
            cluster: "prod",
            credential: &credential,
            config: &config,
            coordination_hosts: &coordination,
            rpc_hosts: &rpc,
            master: "m1",
            ui: "",
        };

        let plan = build_plan_with(&inputs, &Recorder);
        let statements: Vec<&str> = plan.statements().map(|s| s.as_str()).collect();
        assert_eq!(
            statements,
            vec![
                "bootstrap",
                "creds us-east-1 AKIA",
                "storage-install",
                "storage-configure",
                "cert-install",
                "cert-configure /c.pem prod",
                "messaging-download",
                "messaging-configure",
                "agent-download",
                "agent-config",
                "ssh-keys ubuntu deploy",
                "primary-download https://a/stream.tar.gz",
                "coordination-download https://a/coord.tar.gz",
                "monitoring-install",
                "first",
                "second",
                "coordination-configure z1,z2",
                "primary-configure m1 z1,z2 r1",
                "monitoring-configure prod ",
                "after",
                "start coordination",
                "start master",
                "start worker",
                "start ui",
                "start rpc",
                "start logviewer",
                "monitoring-start",
            ]
        );
    }

    #[test]
    fn test_empty_hostnames_pass_through() {
        let plan = build_plan("prod", &Credential::new("id", "sec"), &config(), &[], &[], "", "");
        assert_eq!(plan.steps().len(), 18);
        let script = plan.to_script();
        assert!(script.contains("nimbus.seeds: [\"\"]"));
    }

    #[test]
    fn test_script_rendering() {
        let mut config = config();
        config.post_config = vec!["echo done".into()];
        let script = plan(&Credential::new("id", "sec"), &config).to_script();

        assert!(script.starts_with("#!/bin/bash\nset -e\n"));
        assert!(script.contains("\n# --- package-bootstrap ---\n"));
        assert!(script.contains("\n# --- post-config-hooks ---\necho done\n"));
        assert!(script.find("# --- primary-config ---") < script.find("# --- start-master ---"));
    }

    #[test]
    fn test_check_order_rejects_regression() {
        let plan = Plan {
            steps: vec![
                ProvisioningStep { id: StepId::StartMaster, phase: Phase::Start, statements: Vec::new() },
                ProvisioningStep { id: StepId::PrimaryConfig, phase: Phase::Configure, statements: Vec::new() },
            ],
        };
        assert!(plan.check_order().is_err());
    }

    #[test]
    fn test_node_script_writes_roles_before_any_step() {
        let plan = plan(&Credential::new("id", "sec"), &config());
        let roles: RoleSet = [Role::Worker, Role::Coordination].into_iter().collect();
        let script = plan.to_node_script(&roles, &Recorder);

        assert!(script.starts_with("#!/bin/bash\nset -e\n\n# --- node-roles ---\nroles [worker, zk]\n"));
        let roles_at = script.find("# --- node-roles ---").unwrap();
        let bootstrap_at = script.find("# --- package-bootstrap ---").unwrap();
        assert!(roles_at < bootstrap_at);
        assert!(script.ends_with(plan.to_script().trim_start_matches("#!/bin/bash\nset -e\n")));
    }

    #[test]
    fn test_shell_node_script_provides_roles_file_for_gated_starts() {
        let plan = plan(&Credential::new("id", "sec"), &config());
        let roles: RoleSet = [Role::Master].into_iter().collect();
        let script = plan.to_node_script(&roles, &ShellToolchain);

        let written = script.find("cat > /etc/squall/roles <<'SQUALL_EOF'\nmaster\n").unwrap();
        let first_gate = script.find("if grep -qx zk /etc/squall/roles").unwrap();
        assert!(written < script.find("# --- start-coordination ---").unwrap());
        assert!(written < first_gate);
        assert!(script.contains("if grep -qx master /etc/squall/roles"));

        // the shared plan never writes the file itself
        assert!(!plan.to_script().contains("cat > /etc/squall/roles"));
    }
}
