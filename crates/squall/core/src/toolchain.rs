//! Installers and configurators invoked by the plan builder.
//!
//! The builder only decides which of these run and in what order; the
//! [`Toolchain`] decides what each one actually executes on the node.
//! [`ShellToolchain`] renders plain bash for Debian-family images.
//!
//! Every node gets the same statements. Daemon start statements check
//! `/etc/squall/roles` so only the daemons matching the node's roles get
//! registered with supervisor. The file holds one role tag per line and is
//! written by [`Toolchain::write_node_roles`] ahead of the plan, see
//! [`Plan::to_node_script`](crate::plan::Plan::to_node_script). A start step
//! that finds no roles file fails instead of skipping.

use crate::config::{CertificatePair, Credential, DeploymentConfiguration};
use crate::plan::Statement;
use crate::role::{Role, RoleSet};

const INSTALL_ROOT: &str = "/opt/squall";
const ROLES_FILE: &str = "/etc/squall/roles";
const AGENT_BIN: &str = "/usr/local/bin/squall-agent";
const AGENT_URL: &str =
    "https://github.com/squall-rs/squall/releases/latest/download/squall-agent-x86_64-unknown-linux-gnu";
const ZEROMQ_VERSION: &str = "4.3.5";
const COORDINATION_CLIENT_PORT: u16 = 2181;

/// Daemons kept alive by the process supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daemon {
    Coordination,
    Master,
    Worker,
    Ui,
    Rpc,
    LogViewer,
}

impl Daemon {
    /// Supervisor program name
    pub fn program(&self) -> &'static str {
        match self {
            Daemon::Coordination => "coordination",
            Daemon::Master => "master",
            Daemon::Worker => "worker",
            Daemon::Ui => "ui",
            Daemon::Rpc => "rpc",
            Daemon::LogViewer => "logviewer",
        }
    }

    /// Role a node needs to run this daemon; `None` runs everywhere
    pub fn role(&self) -> Option<Role> {
        match self {
            Daemon::Coordination => Some(Role::Coordination),
            Daemon::Master => Some(Role::Master),
            Daemon::Worker => Some(Role::Worker),
            Daemon::Ui => Some(Role::Ui),
            Daemon::Rpc => Some(Role::Rpc),
            Daemon::LogViewer => None,
        }
    }

    fn command(&self) -> String {
        match self {
            Daemon::Coordination => format!("{}/coordination/bin/zkServer.sh start-foreground", INSTALL_ROOT),
            Daemon::Master => format!("{}/stream/bin/storm nimbus", INSTALL_ROOT),
            Daemon::Worker => format!("{}/stream/bin/storm supervisor", INSTALL_ROOT),
            Daemon::Ui => format!("{}/stream/bin/storm ui", INSTALL_ROOT),
            Daemon::Rpc => format!("{}/stream/bin/storm drpc", INSTALL_ROOT),
            Daemon::LogViewer => format!("{}/stream/bin/storm logviewer", INSTALL_ROOT),
        }
    }
}

pub trait Toolchain {
    fn bootstrap_packages(&self) -> Vec<Statement>;
    fn configure_cloud_credentials(&self, region: &str, credential: &Credential) -> Vec<Statement>;
    fn install_storage_cli(&self) -> Vec<Statement>;
    fn configure_storage_cli(&self, credential: &Credential) -> Vec<Statement>;
    fn install_certificate_tools(&self) -> Vec<Statement>;
    fn configure_certificate_tools(&self, pair: &CertificatePair, region: &str, cluster: &str) -> Vec<Statement>;
    fn download_messaging(&self) -> Vec<Statement>;
    fn configure_messaging(&self) -> Vec<Statement>;
    fn download_agent(&self) -> Vec<Statement>;
    fn write_agent_config(&self, config: &DeploymentConfiguration, credential: &Credential) -> Vec<Statement>;
    fn write_local_ssh_keys(&self, user: &str, key_name: &str) -> Vec<Statement>;
    fn download_primary(&self, url: &str) -> Vec<Statement>;
    fn download_coordination(&self, url: &str) -> Vec<Statement>;
    fn install_monitoring(&self) -> Vec<Statement>;
    fn run_custom_commands(&self, commands: &[String]) -> Vec<Statement>;
    fn configure_coordination(&self, coordination_hosts: &[String]) -> Vec<Statement>;
    fn configure_primary(&self, master: &str, coordination_hosts: &[String], rpc_hosts: &[String], user: &str) -> Vec<Statement>;
    fn configure_monitoring(&self, cluster: &str, ui: &str) -> Vec<Statement>;
    fn start_supervised(&self, daemon: Daemon, user: &str) -> Vec<Statement>;
    fn start_monitoring(&self) -> Vec<Statement>;
    fn run_memory_monitor(&self, user: &str) -> Vec<Statement>;
    /// Record which roles this node holds, read by the daemon starts
    fn write_node_roles(&self, roles: &RoleSet) -> Vec<Statement>;
}

#[derive(Debug, Clone, Default)]
pub struct ShellToolchain;

fn st(command: impl Into<String>) -> Statement {
    Statement::new(command)
}

fn apt_install(packages: &[&str]) -> Statement {
    st(format!("apt-get install -q -y {}", packages.join(" ")))
}

/// Write `content` to `path` through a quoted heredoc so nothing expands
fn write_file(path: &str, content: &str) -> Statement {
    st(format!("cat > {} <<'SQUALL_EOF'\n{}\nSQUALL_EOF", path, content.trim_end()))
}

fn yaml_list(key: &str, values: &[String]) -> String {
    let mut out = format!("{}:\n", key);
    for value in values {
        out.push_str(&format!("    - \"{}\"\n", value));
    }
    out
}

fn supervisor_program(name: &str, command: &str, user: &str) -> String {
    format!(
        "[program:{name}]\ncommand={command}\nuser={user}\nautostart=true\nautorestart=true\nstartsecs=10\nstdout_logfile=/var/log/squall/{name}.log\nredirect_stderr=true"
    )
}

impl Toolchain for ShellToolchain {
    fn bootstrap_packages(&self) -> Vec<Statement> {
        vec![
            st("export DEBIAN_FRONTEND=noninteractive"),
            st("apt-get update -q"),
            apt_install(&[
                "openjdk-11-jre-headless",
                "supervisor",
                "build-essential",
                "libtool",
                "pkg-config",
                "autoconf",
                "automake",
                "uuid-dev",
                "curl",
                "unzip",
            ]),
            st(format!("mkdir -p {} /etc/squall /var/log/squall", INSTALL_ROOT)),
        ]
    }

    fn configure_cloud_credentials(&self, region: &str, credential: &Credential) -> Vec<Statement> {
        vec![
            st("mkdir -p $HOME/.aws"),
            write_file(
                "$HOME/.aws/credentials",
                &format!(
                    "[default]\naws_access_key_id = {}\naws_secret_access_key = {}",
                    credential.identity, credential.secret
                ),
            ),
            write_file("$HOME/.aws/config", &format!("[default]\nregion = {}", region)),
            st("chmod 600 $HOME/.aws/credentials"),
        ]
    }

    fn install_storage_cli(&self) -> Vec<Statement> {
        vec![apt_install(&["s3cmd"])]
    }

    fn configure_storage_cli(&self, credential: &Credential) -> Vec<Statement> {
        vec![
            write_file(
                "$HOME/.s3cfg",
                &format!(
                    "[default]\naccess_key = {}\nsecret_key = {}\nuse_https = True",
                    credential.identity, credential.secret
                ),
            ),
            st("chmod 600 $HOME/.s3cfg"),
        ]
    }

    fn install_certificate_tools(&self) -> Vec<Statement> {
        vec![apt_install(&["ec2-ami-tools"])]
    }

    fn configure_certificate_tools(&self, pair: &CertificatePair, region: &str, cluster: &str) -> Vec<Statement> {
        vec![
            st(format!("echo 'EC2_CERT={}' >> /etc/environment", pair.certificate_path)),
            st(format!("echo 'EC2_PRIVATE_KEY={}' >> /etc/environment", pair.private_key_path)),
            st(format!("echo 'EC2_REGION={}' >> /etc/environment", region)),
            st(format!("echo 'SQUALL_CLUSTER={}' >> /etc/environment", cluster)),
        ]
    }

    fn download_messaging(&self) -> Vec<Statement> {
        vec![
            st(format!(
                "curl -sSfL https://github.com/zeromq/libzmq/releases/download/v{v}/zeromq-{v}.tar.gz -o /tmp/zeromq.tar.gz",
                v = ZEROMQ_VERSION
            )),
            st("tar -xzf /tmp/zeromq.tar.gz -C /tmp"),
        ]
    }

    fn configure_messaging(&self) -> Vec<Statement> {
        vec![
            st(format!(
                "cd /tmp/zeromq-{} && ./configure && make && make install",
                ZEROMQ_VERSION
            )),
            st("ldconfig"),
        ]
    }

    fn download_agent(&self) -> Vec<Statement> {
        vec![
            st(format!("curl -sSfL {} -o {}", AGENT_URL, AGENT_BIN)),
            st(format!("chmod +x {}", AGENT_BIN)),
        ]
    }

    fn write_agent_config(&self, config: &DeploymentConfiguration, credential: &Credential) -> Vec<Statement> {
        let conf_dir = format!("/home/{}/.squall", config.image_user);
        let deployment = format!(
            "[deployment]\nregion = \"{}\"\nimage-user = \"{}\"\nssh-key = \"{}\"\nmemory-monitor = {}",
            config.region, config.image_user, config.ssh_key, config.memory_monitor
        );
        let credential = format!(
            "[credential]\nidentity = \"{}\"\nsecret = \"{}\"",
            credential.identity, credential.secret
        );
        vec![
            st(format!("mkdir -p {}", conf_dir)),
            write_file(&format!("{}/configuration.toml", conf_dir), &deployment),
            write_file(&format!("{}/credential.toml", conf_dir), &credential),
            st(format!("chmod 600 {}/credential.toml", conf_dir)),
            st(format!("chown -R {user}:{user} {}", conf_dir, user = config.image_user)),
        ]
    }

    fn write_local_ssh_keys(&self, user: &str, key_name: &str) -> Vec<Statement> {
        let ssh_dir = format!("/home/{}/.ssh", user);
        vec![
            st(format!("mkdir -p {}", ssh_dir)),
            st(format!(
                "test -f {dir}/{key} || ssh-keygen -q -t ed25519 -N '' -f {dir}/{key}",
                dir = ssh_dir,
                key = key_name
            )),
            st(format!(
                "grep -qf {dir}/{key}.pub {dir}/authorized_keys || cat {dir}/{key}.pub >> {dir}/authorized_keys",
                dir = ssh_dir,
                key = key_name
            )),
            st(format!("chown -R {user}:{user} {}", ssh_dir, user = user)),
        ]
    }

    fn download_primary(&self, url: &str) -> Vec<Statement> {
        vec![
            st(format!("curl -sSfL {} -o /tmp/stream.tar.gz", url)),
            st(format!("mkdir -p {}/stream", INSTALL_ROOT)),
            st(format!("tar -xzf /tmp/stream.tar.gz -C {}/stream --strip-components=1", INSTALL_ROOT)),
        ]
    }

    fn download_coordination(&self, url: &str) -> Vec<Statement> {
        vec![
            st(format!("curl -sSfL {} -o /tmp/coordination.tar.gz", url)),
            st(format!("mkdir -p {}/coordination/data", INSTALL_ROOT)),
            st(format!(
                "tar -xzf /tmp/coordination.tar.gz -C {}/coordination --strip-components=1",
                INSTALL_ROOT
            )),
        ]
    }

    fn install_monitoring(&self) -> Vec<Statement> {
        vec![apt_install(&["ganglia-monitor"])]
    }

    fn run_custom_commands(&self, commands: &[String]) -> Vec<Statement> {
        commands.iter().map(|c| st(c.as_str())).collect()
    }

    fn configure_coordination(&self, coordination_hosts: &[String]) -> Vec<Statement> {
        let mut zoo = format!(
            "tickTime=2000\ninitLimit=10\nsyncLimit=5\ndataDir={}/coordination/data\nclientPort={}\n",
            INSTALL_ROOT, COORDINATION_CLIENT_PORT
        );
        for (i, host) in coordination_hosts.iter().enumerate() {
            zoo.push_str(&format!("server.{}={}:2888:3888\n", i + 1, host));
        }

        // Ensemble id is this node's 1-based position in the host list
        let myid = format!(
            "MYID=0; i=1; for h in {}; do if hostname -I | grep -qw \"$h\"; then MYID=$i; fi; i=$((i+1)); done; echo $MYID > {}/coordination/data/myid",
            coordination_hosts.join(" "),
            INSTALL_ROOT
        );

        vec![
            write_file(&format!("{}/coordination/conf/zoo.cfg", INSTALL_ROOT), &zoo),
            st(myid),
        ]
    }

    fn configure_primary(&self, master: &str, coordination_hosts: &[String], rpc_hosts: &[String], user: &str) -> Vec<Statement> {
        let mut conf = yaml_list("storm.zookeeper.servers", coordination_hosts);
        conf.push_str(&format!("storm.zookeeper.port: {}\n", COORDINATION_CLIENT_PORT));
        conf.push_str(&format!("nimbus.seeds: [\"{}\"]\n", master));
        conf.push_str(&yaml_list("drpc.servers", rpc_hosts));
        conf.push_str(&format!("storm.local.dir: \"{}/stream/data\"\n", INSTALL_ROOT));

        vec![
            write_file(&format!("{}/stream/conf/storm.yaml", INSTALL_ROOT), &conf),
            st(format!("mkdir -p {}/stream/data", INSTALL_ROOT)),
            st(format!("chown -R {user}:{user} {}", INSTALL_ROOT, user = user)),
        ]
    }

    fn configure_monitoring(&self, cluster: &str, ui: &str) -> Vec<Statement> {
        vec![
            st(format!(
                "sed -i 's/name = \"unspecified\"/name = \"{}\"/' /etc/ganglia/gmond.conf",
                cluster
            )),
            st(format!(
                "sed -i 's/^\\s*mcast_join = .*/  host = {}/' /etc/ganglia/gmond.conf",
                ui
            )),
        ]
    }

    fn start_supervised(&self, daemon: Daemon, user: &str) -> Vec<Statement> {
        let program = daemon.program();
        let register = format!(
            "{}\nsupervisorctl reread && supervisorctl update",
            write_file(
                &format!("/etc/supervisor/conf.d/{}.conf", program),
                &supervisor_program(program, &daemon.command(), user),
            )
        );
        match daemon.role() {
            Some(role) => vec![
                st(format!("test -f {}", ROLES_FILE)),
                st(format!("if grep -qx {} {}; then\n{}\nfi", role.tag(), ROLES_FILE, register)),
            ],
            None => vec![st(register)],
        }
    }

    fn start_monitoring(&self) -> Vec<Statement> {
        vec![st("service ganglia-monitor restart")]
    }

    fn run_memory_monitor(&self, user: &str) -> Vec<Statement> {
        let program = supervisor_program(
            "memory-monitor",
            &format!("{} memory-monitor --config /home/{}/.squall/configuration.toml", AGENT_BIN, user),
            user,
        );
        vec![
            write_file("/etc/supervisor/conf.d/memory-monitor.conf", &program),
            st("supervisorctl reread && supervisorctl update"),
        ]
    }

    fn write_node_roles(&self, roles: &RoleSet) -> Vec<Statement> {
        let tags: Vec<&str> = roles.iter().map(|role| role.tag()).collect();
        vec![
            st("mkdir -p /etc/squall"),
            write_file(ROLES_FILE, &tags.join("\n")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(statements: &[Statement]) -> String {
        statements.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_coordination_config_lists_every_host() {
        let hosts = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        let script = joined(&ShellToolchain.configure_coordination(&hosts));

        assert!(script.contains("server.1=10.0.0.1:2888:3888"));
        assert!(script.contains("server.2=10.0.0.2:2888:3888"));
        assert!(script.contains("for h in 10.0.0.1 10.0.0.2;"));
    }

    #[test]
    fn test_primary_config_contains_roles() {
        let script = joined(&ShellToolchain.configure_primary(
            "10.0.0.1",
            &["10.0.0.2".to_string()],
            &["10.0.0.3".to_string()],
            "ubuntu",
        ));

        assert!(script.contains("nimbus.seeds: [\"10.0.0.1\"]"));
        assert!(script.contains("storm.zookeeper.servers:\n    - \"10.0.0.2\""));
        assert!(script.contains("drpc.servers:\n    - \"10.0.0.3\""));
    }

    #[test]
    fn test_role_gated_daemons() {
        let master = ShellToolchain.start_supervised(Daemon::Master, "ubuntu");
        assert_eq!(master[0].as_str(), "test -f /etc/squall/roles");
        assert!(master[1].as_str().starts_with("if grep -qx master /etc/squall/roles; then"));
        assert!(master[1].as_str().contains("user=ubuntu"));

        let rpc = joined(&ShellToolchain.start_supervised(Daemon::Rpc, "ubuntu"));
        assert!(rpc.contains("grep -qx drpc"));

        let logviewer = joined(&ShellToolchain.start_supervised(Daemon::LogViewer, "ubuntu"));
        assert!(!logviewer.contains("/etc/squall/roles"));
        assert!(logviewer.contains("[program:logviewer]"));
    }

    #[test]
    fn test_custom_commands_are_verbatim() {
        let commands = vec!["echo 'a b'".to_string(), "touch /tmp/$X".to_string()];
        let statements = ShellToolchain.run_custom_commands(&commands);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].as_str(), "echo 'a b'");
        assert_eq!(statements[1].as_str(), "touch /tmp/$X");
    }

    #[test]
    fn test_node_roles_file_has_one_tag_per_line() {
        let roles: RoleSet = [Role::Coordination, Role::Master].into_iter().collect();
        let statements = ShellToolchain.write_node_roles(&roles);

        assert_eq!(statements[0].as_str(), "mkdir -p /etc/squall");
        assert_eq!(
            statements[1].as_str(),
            "cat > /etc/squall/roles <<'SQUALL_EOF'\nmaster\nzk\nSQUALL_EOF"
        );
    }

    #[test]
    fn test_node_without_roles_gets_empty_file() {
        let statements = ShellToolchain.write_node_roles(&RoleSet::new());
        assert_eq!(statements[1].as_str(), "cat > /etc/squall/roles <<'SQUALL_EOF'\n\nSQUALL_EOF");
    }
}
