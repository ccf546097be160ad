//! buildkitd.toml maintenance

use crate::error::{Error, Result};
use std::path::Path;
use toml::{Table, Value};
use tracing::{debug, info};

/// Make sure `[registry."<host>"]` allows plain HTTP for every host
///
/// Existing entries, including ones for the same hosts, are left as they
/// are. The file is rewritten only when an entry was added. Returns whether
/// it changed.
pub fn ensure_insecure_registries(path: &Path, hosts: &[String]) -> Result<bool> {
    if hosts.is_empty() {
        return Ok(false);
    }

    let mut config: Table = if path.exists() {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        Table::new()
    };

    let registries = config
        .entry("registry")
        .or_insert_with(|| Value::Table(Table::new()));
    let Value::Table(registries) = registries else {
        return Err(Error::invalid_config(format!(
            "{}: `registry` must be a table",
            path.display()
        )));
    };

    let mut added = Vec::new();
    for host in hosts {
        if registries.contains_key(host) {
            debug!("buildkitd already configures registry {}", host);
            continue;
        }
        let mut entry = Table::new();
        entry.insert("insecure".into(), Value::Boolean(true));
        entry.insert("http".into(), Value::Boolean(true));
        registries.insert(host.clone(), Value::Table(entry));
        added.push(host.as_str());
    }

    if added.is_empty() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&config)?)?;
    info!(
        "Marked {} as insecure in {}",
        added.join(", "),
        path.display()
    );
    Ok(true)
}
