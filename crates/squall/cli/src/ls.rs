use comfy_table::{Cell, Table};
use std::path::Path;

use crate::cluster::discover_live;
use crate::config;

pub fn handle_topology_command(config_path: Option<&Path>, cluster: String) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::parse_config(config_path)?;
    let discovery = discover_live(&settings, &cluster)?;
    let topology = &discovery.topology;

    if topology.is_empty() {
        println!("No instances found for cluster {}.", cluster);
    } else {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Address", "Roles"]);

        for (instance, roles) in topology.members() {
            table.add_row(vec![
                Cell::new(&instance.id),
                Cell::new(instance.address.as_deref().unwrap_or("-")),
                Cell::new(roles),
            ]);
        }

        println!("Cluster {}", cluster);
        println!("{}", table);
    }

    if topology.master.is_none() {
        println!("\nNo master instance found.");
    }
    for warning in &discovery.warnings {
        println!("Warning: {}", warning);
    }
    Ok(())
}
