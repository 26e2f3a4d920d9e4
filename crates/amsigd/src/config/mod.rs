//! Configuration loader (strict YAML parsing).
//!
//! Loading resolves template paths relative to the config file, applies
//! receiver defaults, and validates the receiver list. Any failure here is
//! fatal: the service refuses to start with ambiguous routing.

pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use amsig_core::{Receiver, ReceiverTable};
use tracing::debug;

use crate::connection::DEFAULT_SOCKET_PATH;
use crate::error::ConfigError;
use crate::templates::DEFAULT_TEMPLATE;

pub use schema::{FileConfig, ReceiverEntry};

/// Resolved configuration, ready to build the application context from.
#[derive(Debug, Clone)]
pub struct Config {
    /// signald socket path
    pub socket_path: PathBuf,

    /// Reply to inbound chat commands
    pub commands_enabled: bool,

    /// Run the keepalive loop
    pub keepalive_enabled: bool,

    /// Account used for keepalive lookups: the default sender, or the
    /// first receiver's sender when no default is set
    pub keepalive_sender: Option<String>,

    /// Absolute (or config-relative resolved) template file paths
    pub template_files: Vec<PathBuf>,

    pub receivers: ReceiverTable,
}

/// Reads and resolves a configuration file.
pub fn load_from_file(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_from_str(&s, base_dir)
}

/// Parses and resolves configuration text; relative paths join `base_dir`.
pub fn load_from_str(s: &str, base_dir: &Path) -> Result<Config, ConfigError> {
    let file: FileConfig = serde_yaml::from_str(s)?;
    resolve(file, base_dir)
}

fn resolve(file: FileConfig, base_dir: &Path) -> Result<Config, ConfigError> {
    let template_files = file
        .templates
        .iter()
        .map(|p| resolve_path(base_dir, p))
        .collect();

    let socket_path = file
        .socket
        .as_deref()
        .map(|p| resolve_path(base_dir, p))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));

    let receivers: Vec<Receiver> = file
        .receivers
        .into_iter()
        .map(|mut entry| {
            entry.inherit(&file.defaults);
            into_receiver(entry)
        })
        .collect();

    let keepalive_sender = if file.defaults.sender.is_empty() {
        receivers.first().map(|r| r.sender.clone())
    } else {
        Some(file.defaults.sender.clone())
    }
    .filter(|s| !s.is_empty());

    let receivers = ReceiverTable::new(receivers)?;
    debug!(receivers = receivers.len(), "Configuration resolved");

    Ok(Config {
        socket_path,
        commands_enabled: file.commands,
        keepalive_enabled: file.keepalive,
        keepalive_sender,
        template_files,
        receivers,
    })
}

fn into_receiver(entry: ReceiverEntry) -> Receiver {
    let template = if entry.template.is_empty() {
        DEFAULT_TEMPLATE.to_string()
    } else {
        entry.template
    };
    Receiver {
        name: entry.name,
        sender: entry.sender,
        to: entry.to,
        template,
        subscribe: entry.subscribe.unwrap_or(false),
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
