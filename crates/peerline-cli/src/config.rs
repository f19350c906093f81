//! Peerline CLI configuration
//!
//! A TOML file whose `core` table holds engine settings. The `demo` table
//! describes the simulated world the engine runs against. Missing tables and
//! keys fall back to their defaults.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use peerline_core::{LocalAddress, PeerlineConfig};
use peerline_harness::MicMode;

use crate::error::{CliError, Result};

/// Complete configuration for the Peerline CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Engine configuration
    pub core: PeerlineConfig,
    pub cli: CliConfig,
    pub demo: DemoConfig,
}

/// Terminal behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub verbose: bool,
    /// Prompt printed before each interactive line
    pub prompt: String,
    /// Print app events as JSON lines instead of text
    pub json_events: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            prompt: "peerline> ".to_string(),
            json_events: false,
        }
    }
}

/// How the simulated microphone answers capture requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicSetting {
    #[default]
    Grant,
    Deny,
    Unsupported,
}

impl From<MicSetting> for MicMode {
    fn from(setting: MicSetting) -> Self {
        match setting {
            MicSetting::Grant => MicMode::Grant,
            MicSetting::Deny => MicMode::Deny,
            MicSetting::Unsupported => MicMode::Unsupported,
        }
    }
}

/// One address book entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub name: String,
    pub address: String,
}

/// The simulated world around the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Address the scripted echo peer registers under
    pub echo_address: String,
    pub microphone: MicSetting,
    pub contacts: Vec<ContactEntry>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            echo_address: "555555".to_string(),
            microphone: MicSetting::Grant,
            contacts: vec![ContactEntry {
                name: "Echo".to_string(),
                address: "555555".to_string(),
            }],
        }
    }
}

impl CliAppConfig {
    /// Load and validate a TOML configuration file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: CliAppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the demo cannot run with
    pub fn validate(&self) -> Result<()> {
        self.core.validate()?;
        if self.cli.prompt.trim().is_empty() {
            return Err(CliError::Config("cli.prompt must not be empty".to_string()));
        }
        self.echo_address()?;
        self.contacts()?;
        Ok(())
    }

    pub fn echo_address(&self) -> Result<LocalAddress> {
        LocalAddress::parse(&self.demo.echo_address).map_err(|_| {
            CliError::Config(format!(
                "demo.echo_address is not a valid address: {:?}",
                self.demo.echo_address
            ))
        })
    }

    /// Address book entries as (name, address) pairs
    pub fn contacts(&self) -> Result<Vec<(String, LocalAddress)>> {
        self.demo
            .contacts
            .iter()
            .map(|entry| {
                if entry.name.trim().is_empty() {
                    return Err(CliError::Config("contact name must not be empty".to_string()));
                }
                let address = LocalAddress::parse(&entry.address).map_err(|_| {
                    CliError::Config(format!(
                        "contact {} has an invalid address: {:?}",
                        entry.name, entry.address
                    ))
                })?;
                Ok((entry.name.clone(), address))
            })
            .collect()
    }

    /// Example configuration, printed by `peerline example-config`
    pub fn example_config() -> Result<String> {
        let mut config = Self {
            core: PeerlineConfig::low_latency(),
            ..Self::default()
        };
        config.demo.contacts.push(ContactEntry {
            name: "Alice".to_string(),
            address: "111111".to_string(),
        });
        Ok(toml::to_string_pretty(&config)?)
    }
}
