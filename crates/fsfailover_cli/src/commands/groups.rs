//! Groups command implementation.

use super::OutputFormat;
use fsfailover_core::{FailoverConfig, TransportKind};
use serde::Serialize;
use std::path::Path;

/// One configured group.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GroupInfo {
    /// Group name.
    pub name: String,
    /// Backend descriptions in priority order.
    pub backends: Vec<String>,
}

/// Result of the groups command.
#[derive(Debug, Serialize)]
pub struct GroupsResult {
    /// Configured transport.
    pub transport: TransportKind,
    /// Groups in name order.
    pub groups: Vec<GroupInfo>,
}

/// Runs the groups command.
pub fn run(config_path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let config = FailoverConfig::load(config_path)?;
    let result = describe(&config);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            println!("Transport: {:?}", result.transport);
            for group in &result.groups {
                println!();
                println!("{}", group.name);
                for (index, backend) in group.backends.iter().enumerate() {
                    let role = if index == 0 { " (primary)" } else { "" };
                    println!("  [{index}] {backend}{role}");
                }
            }
        }
    }

    Ok(())
}

fn describe(config: &FailoverConfig) -> GroupsResult {
    GroupsResult {
        transport: config.transport,
        groups: config
            .groups
            .iter()
            .map(|(name, group)| GroupInfo {
                name: name.clone(),
                backends: group.backends.iter().map(|b| b.describe()).collect(),
            })
            .collect(),
    }
}
