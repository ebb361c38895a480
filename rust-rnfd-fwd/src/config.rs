//! Forwarder configuration.
//!
//! Loaded from a TOML file via the `config` crate and deserialized with
//! `deny_unknown_fields`, so a typo'd key fails loudly with the section and
//! key named. Dry-run evaluation parses and validates without touching any
//! state.

use crate::fw::{ForwarderOptions, UnsolicitedDataPolicy};
use rust_rnfd_common::Error;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ForwarderSection {
    /// HopLimit attached to Interests that carry none; 0 disables.
    pub default_hop_limit: u8,
}

impl Default for ForwarderSection {
    fn default() -> Self {
        Self { default_hop_limit: 0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReflexiveSection {
    /// Keep a PIT entry for producer-originated reflexive Interests.
    pub ri_pit_entry: bool,
}

impl Default for ReflexiveSection {
    fn default() -> Self {
        Self { ri_pit_entry: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TablesSection {
    pub cs_capacity: usize,
    pub dead_nonce_lifetime_ms: u64,
    pub cache_unsolicited: bool,
}

impl Default for TablesSection {
    fn default() -> Self {
        Self {
            cs_capacity: crate::tables::cs::DEFAULT_CS_CAPACITY,
            dead_nonce_lifetime_ms: crate::tables::dead_nonce_list::DEFAULT_DNL_LIFETIME.as_millis()
                as u64,
            cache_unsolicited: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonSection {
    pub control_socket: String,
    pub listen: Vec<String>,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            control_socket: "/run/rnfd.sock".into(),
            listen: vec!["tcp://0.0.0.0:6363".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RnfdConfig {
    pub forwarder: ForwarderSection,
    pub reflexive: ReflexiveSection,
    pub tables: TablesSection,
    pub daemon: DaemonSection,
}

impl RnfdConfig {
    /// Loads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Dry-run evaluation: parse and validate, mutate nothing.
    pub fn dry_run(path: &Path) -> Result<(), Error> {
        Self::load(path).map(|_| ())
    }

    pub fn forwarder_options(&self) -> ForwarderOptions {
        ForwarderOptions {
            default_hop_limit: self.forwarder.default_hop_limit,
            ri_pit_entry: self.reflexive.ri_pit_entry,
            cs_capacity: self.tables.cs_capacity,
            dead_nonce_lifetime: Duration::from_millis(self.tables.dead_nonce_lifetime_ms),
            unsolicited_policy: if self.tables.cache_unsolicited {
                UnsolicitedDataPolicy::CacheAll
            } else {
                UnsolicitedDataPolicy::DropAll
            },
        }
    }
}
