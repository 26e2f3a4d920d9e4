//! On-disk YAML shape of the configuration file.

use std::path::PathBuf;

use serde::Deserialize;

/// Top level of the YAML file, exactly as written by the operator.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// signald socket path
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Reply to inbound chat commands
    #[serde(default)]
    pub commands: bool,

    /// Run the keepalive loop
    #[serde(default)]
    pub keepalive: bool,

    /// Values inherited by receivers that leave a field empty
    #[serde(default)]
    pub defaults: ReceiverEntry,

    /// Template files; each file's stem becomes its template name
    #[serde(default)]
    pub templates: Vec<PathBuf>,

    #[serde(default)]
    pub receivers: Vec<ReceiverEntry>,
}

/// One `receivers:` entry (or the `defaults:` block).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub template: String,

    #[serde(default)]
    pub sender: String,

    #[serde(default)]
    pub subscribe: Option<bool>,

    #[serde(default)]
    pub to: Vec<String>,
}

impl ReceiverEntry {
    /// Fills every empty field from `defaults`.
    pub fn inherit(&mut self, defaults: &ReceiverEntry) {
        if self.template.is_empty() {
            self.template.clone_from(&defaults.template);
        }
        if self.sender.is_empty() {
            self.sender.clone_from(&defaults.sender);
        }
        if self.to.is_empty() {
            self.to.clone_from(&defaults.to);
        }
        if self.subscribe.is_none() {
            self.subscribe = defaults.subscribe;
        }
    }
}
