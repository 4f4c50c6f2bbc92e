//! ACL engine configuration.
//!
//! Capacities of every object store, the entry priority range, and the
//! platform capabilities that change how bind points are programmed.
//! Loaded from JSON; every field has a default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sonic_sai::api::{PortBitmap, PBMP_PORT_MAX};
use thiserror::Error;

use crate::types::AclPriority;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse ACL config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid ACL config: {0}")]
    Invalid(String),
}

/// Platform capabilities that affect bind point programming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformCapabilities {
    /// Number of front-panel ports; port bind values must be below it.
    pub port_count: u32,
    /// Egress LAG bind points are matched through the in-ports bitmap
    /// instead of the destination trunk qualifier.
    pub lag_via_in_ports: bool,
    /// In-ports qualifiers use the full platform port mask rather than the
    /// data bitmap as mask.
    pub in_ports_full_mask: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            port_count: 64,
            lag_via_in_ports: false,
            in_ports_full_mask: false,
        }
    }
}

impl PlatformCapabilities {
    /// Bitmap of every front-panel port.
    pub fn all_ports(&self) -> PortBitmap {
        PortBitmap::first_n(self.port_count)
    }
}

/// Configuration for AclOrch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Maximum number of tables.
    pub max_tables: u32,
    /// Maximum number of table groups.
    pub max_groups: u32,
    /// Maximum number of group members.
    pub max_members: u32,
    /// Maximum number of hardware-backed entries, clones included.
    pub max_entries: u32,
    /// Maximum number of counters.
    pub max_counters: u32,
    /// Minimum entry priority.
    pub min_priority: AclPriority,
    /// Maximum entry priority.
    pub max_priority: AclPriority,
    /// Number of groups a single table may be a member of.
    pub max_groups_per_table: u32,
    /// Platform capabilities.
    pub platform: PlatformCapabilities,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            max_tables: 64,
            max_groups: 64,
            max_members: 256,
            max_entries: 4096,
            max_counters: 1024,
            min_priority: 0,
            max_priority: 999999,
            max_groups_per_table: 4,
            platform: PlatformCapabilities::default(),
        }
    }
}

impl AclConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AclConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("max_tables", self.max_tables),
            ("max_groups", self.max_groups),
            ("max_members", self.max_members),
            ("max_entries", self.max_entries),
            ("max_counters", self.max_counters),
            ("max_groups_per_table", self.max_groups_per_table),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        // Entry and member handles carry the owner index in 16 bits
        let owner_limit = u32::from(u16::MAX) + 1;
        if self.max_tables > owner_limit || self.max_groups > owner_limit {
            return Err(ConfigError::Invalid(format!(
                "max_tables and max_groups must not exceed {}",
                owner_limit
            )));
        }
        if self.min_priority > self.max_priority {
            return Err(ConfigError::Invalid(format!(
                "min_priority {} exceeds max_priority {}",
                self.min_priority, self.max_priority
            )));
        }
        if self.platform.port_count == 0 || self.platform.port_count > PBMP_PORT_MAX {
            return Err(ConfigError::Invalid(format!(
                "port_count must be in 1..={}",
                PBMP_PORT_MAX
            )));
        }
        Ok(())
    }

    /// Returns true if `priority` is within the configured range.
    pub fn priority_in_range(&self, priority: AclPriority) -> bool {
        (self.min_priority..=self.max_priority).contains(&priority)
    }
}
