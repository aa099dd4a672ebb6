// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! device = "reference-cpu"
//! cache_dir = "./cache"
//! cache_version = 1
//! performance = "high"
//! priority = "medium"
//! enable_fp16 = false
//! run_timeout_ms = 5000
//!
//! [reference]
//! memory_budget = "256M"
//! name = "reference-cpu"
//! vendor = "nnrt"
//! enable_fp16 = false
//! ```

use crate::{Compilation, RuntimeError};
use device_hal::{PerformanceMode, Priority, ReferenceOptions};
use memory_manager::MemoryBudget;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings of the built-in reference device.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReferenceConfig {
    /// Device memory budget (human-readable, e.g. `"256M"`).
    #[serde(default = "default_budget")]
    pub memory_budget: String,
    pub name: Option<String>,
    pub vendor: Option<String>,
    #[serde(default)]
    pub enable_fp16: bool,
}

fn default_budget() -> String {
    "256M".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            memory_budget: default_budget(),
            name: None,
            vendor: None,
            enable_fp16: false,
        }
    }
}

/// Configuration for compiling and running a graph.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Name of the device to compile for; the first registered device if unset.
    pub device: Option<String>,
    /// Cache directory; caching is off if unset.
    pub cache_dir: Option<PathBuf>,
    /// Artifact version written to and expected from the cache.
    #[serde(default)]
    pub cache_version: u32,
    /// Performance mode: `"none"`, `"low"`, `"medium"`, `"high"`, `"extreme"`.
    pub performance: Option<String>,
    /// Priority: `"none"`, `"low"`, `"medium"`, `"high"`.
    pub priority: Option<String>,
    #[serde(default)]
    pub enable_fp16: bool,
    /// Timeout applied to asynchronous runs.
    #[serde(default = "default_timeout_ms")]
    pub run_timeout_ms: u64,
    #[serde(default)]
    pub reference: ReferenceConfig,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn parse_performance(&self) -> Result<Option<PerformanceMode>, RuntimeError> {
        self.performance
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| RuntimeError::ConfigError(format!("performance: {e}")))
    }

    pub fn parse_priority(&self) -> Result<Option<Priority>, RuntimeError> {
        self.priority
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| RuntimeError::ConfigError(format!("priority: {e}")))
    }

    /// Builds the options of the reference device.
    pub fn reference_options(&self) -> Result<ReferenceOptions, RuntimeError> {
        let budget = MemoryBudget::parse(&self.reference.memory_budget)
            .map_err(|e| RuntimeError::ConfigError(format!("invalid budget: {e}")))?;
        let defaults = ReferenceOptions::default();
        Ok(ReferenceOptions {
            name: self.reference.name.clone().unwrap_or(defaults.name),
            vendor: self.reference.vendor.clone().unwrap_or(defaults.vendor),
            memory_budget: budget,
            enable_fp16: self.reference.enable_fp16,
            ..defaults
        })
    }

    /// Applies the configuration to `compilation`, device first.
    ///
    /// Options left unset are not applied, so a device lacking a capability
    /// is only an error when the configuration asks for it.
    pub fn configure(&self, compilation: &mut Compilation) -> Result<(), RuntimeError> {
        let manager = compilation.device_manager().clone();
        let id = match &self.device {
            Some(name) => manager.find_by_name(name).ok_or_else(|| {
                RuntimeError::ConfigError(format!("no device named '{name}'"))
            })?,
            None => manager.all_device_ids().first().copied().ok_or_else(|| {
                RuntimeError::ConfigError("no devices registered".into())
            })?,
        };
        compilation.set_device(id)?;

        if let Some(dir) = &self.cache_dir {
            compilation.set_cache_dir(dir, self.cache_version)?;
        }
        if let Some(mode) = self.parse_performance()? {
            compilation.set_performance(mode)?;
        }
        if let Some(priority) = self.parse_priority()? {
            compilation.set_priority(priority)?;
        }
        if self.enable_fp16 {
            compilation.set_enable_fp16(true)?;
        }
        tracing::debug!("configuration applied to device {id}");
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            device: None,
            cache_dir: None,
            cache_version: 0,
            performance: None,
            priority: None,
            enable_fp16: false,
            run_timeout_ms: default_timeout_ms(),
            reference: ReferenceConfig::default(),
        }
    }
}
