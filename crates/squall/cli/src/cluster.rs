use comfy_table::{Cell, Table};
use squall_core::{
    attach, attach_strict, build_plan, discover_with_warnings, Discovery, FileSink, InstanceProvider, Plan,
    Settings, ShellToolchain,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config;
use crate::providers;
use crate::sh;
use crate::spinner::create_spinner;

fn provider_for(settings: &Settings) -> Result<Box<dyn InstanceProvider>, Box<dyn std::error::Error>> {
    let provider_name = &settings.deployment.provider;
    let provider_config = settings.get_provider(provider_name)
        .ok_or_else(|| format!("Provider '{}' not found in config", provider_name))?;
    Ok(providers::create_provider_handle(provider_name, provider_config)?)
}

/// List the provider's instances and rebuild the topology of `cluster`
pub fn discover_live(settings: &Settings, cluster: &str) -> Result<Discovery, Box<dyn std::error::Error>> {
    let provider_handle = provider_for(settings)?;
    discover_from(provider_handle.as_ref(), cluster)
}

fn discover_from(provider: &dyn InstanceProvider, cluster: &str) -> Result<Discovery, Box<dyn std::error::Error>> {
    let instances = provider.list_instances()?;
    info!(cluster = cluster, instances = instances.len(), "listed provider instances");
    Ok(discover_with_warnings(cluster, &instances))
}

pub fn handle_attach(config_path: Option<&Path>, cluster: String, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = create_spinner();

    spinner.set_message("Parsing configuration...");
    let settings = config::parse_config(config_path)?;

    let provider_handle = provider_for(&settings)?;
    let sink = FileSink::in_home()?;

    spinner.set_message(format!("Attaching to cluster {}...", cluster));
    let outcome = if strict {
        attach_strict(&cluster, provider_handle.as_ref(), &sink)?
    } else {
        attach(&cluster, provider_handle.as_ref(), &sink)?
    };
    let topology = &outcome.discovery.topology;

    if !outcome.persisted {
        spinner.finish_with_message(format!(
            "Discovered cluster {} but could not write {}",
            cluster,
            sink.cluster_dir(&cluster).display()
        ));
        return Ok(());
    }

    let hostnames = topology.hostnames();
    spinner.finish_with_message(format!(
        "Attached to cluster {} (master: {}, {} workers, {} coordination nodes)",
        cluster,
        if hostnames.master.is_empty() { "none" } else { hostnames.master.as_str() },
        hostnames.workers.len(),
        hostnames.coordination.len(),
    ));
    Ok(())
}

fn plan_for(settings: &Settings, discovery: &Discovery) -> Plan {
    let hostnames = discovery.topology.hostnames();
    build_plan(
        &discovery.topology.cluster,
        &settings.credential,
        &settings.deployment,
        &hostnames.coordination,
        &hostnames.rpc,
        &hostnames.master,
        &hostnames.ui,
    )
}

/// Discover `cluster` for plan building. Also settles the image user, which
/// falls back to the provider's default when the config leaves it unset.
fn discover_checked(settings: &mut Settings, cluster: &str, strict: bool) -> Result<Discovery, Box<dyn std::error::Error>> {
    let provider_handle = provider_for(settings)?;
    settings.deployment.resolve_image_user(provider_handle.as_ref())?;

    let discovery = discover_from(provider_handle.as_ref(), cluster)?;
    for warning in &discovery.warnings {
        warn!(cluster = cluster, "{}", warning);
    }
    if strict {
        discovery.validate()?;
    }
    Ok(discovery)
}

pub fn handle_plan(config_path: Option<&Path>, cluster: String, output: Option<PathBuf>, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = create_spinner();

    spinner.set_message("Parsing configuration...");
    let mut settings = config::parse_config(config_path)?;

    spinner.set_message(format!("Discovering cluster {}...", cluster));
    let discovery = discover_checked(&mut settings, &cluster, strict)?;
    let plan = plan_for(&settings, &discovery);

    if let Some(path) = output {
        fs::write(&path, plan.to_script())
            .map_err(|e| format!("Failed to write plan to {}: {}", path.display(), e))?;
        spinner.finish_with_message(format!("Wrote {} steps to {}", plan.steps().len(), path.display()));
        return Ok(());
    }
    spinner.finish_and_clear();

    let mut table = Table::new();
    table.set_header(vec!["#", "Step", "Phase", "Statements"]);
    for (i, step) in plan.steps().iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(step.id),
            Cell::new(format!("{:?}", step.phase)),
            Cell::new(step.statements.len()),
        ]);
    }

    println!("Plan for {}", cluster);
    println!("{}", table);
    Ok(())
}

pub fn handle_deploy(config_path: Option<&Path>, cluster: String, host: String, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let spinner = create_spinner();

    spinner.set_message("Parsing configuration...");
    let mut settings = config::parse_config(config_path)?;

    spinner.set_message(format!("Discovering cluster {}...", cluster));
    let discovery = discover_checked(&mut settings, &cluster, strict)?;
    let plan = plan_for(&settings, &discovery);
    let roles = discovery.topology.roles_at(&host)
        .ok_or_else(|| format!("{} is not a member of cluster {}", host, cluster))?;

    let dir = FileSink::in_home()?.cluster_dir(&cluster);
    fs::create_dir_all(&dir)?;
    let script_path = dir.join("plan.sh");
    fs::write(&script_path, plan.to_node_script(&roles, &ShellToolchain))?;
    info!(path = %script_path.display(), host = %host, roles = %roles, steps = plan.steps().len(), "wrote plan");

    let user = &settings.deployment.image_user;
    let key = dirs::home_dir()
        .ok_or("Unable to determine home directory")?
        .join(".ssh")
        .join(&settings.deployment.ssh_key);

    spinner.set_message(format!("Provisioning {} ({} steps)...", host, plan.steps().len()));
    sh::run(&format!(
        "ssh -i {} -o StrictHostKeyChecking=accept-new {}@{} 'sudo bash -s' < {}",
        key.display(),
        user,
        host,
        script_path.display()
    ))?;

    spinner.finish_with_message(format!("Provisioned {} for cluster {}", host, cluster));
    Ok(())
}
