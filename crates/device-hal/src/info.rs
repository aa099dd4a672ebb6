// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device metadata and compile-time configuration enums.

use crate::DeviceError;
use std::fmt;
use std::str::FromStr;

/// Coarse classification of a back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Cpu,
    Gpu,
    Accelerator,
    Other,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Accelerator => "accelerator",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Live status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Available,
    Busy,
    Offline,
    Unknown,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Optional features a device may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Fp16,
    PerformanceMode,
    Priority,
    DynamicInput,
    ModelCache,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Fp16,
        Capability::PerformanceMode,
        Capability::Priority,
        Capability::DynamicInput,
        Capability::ModelCache,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fp16 => "fp16",
            Self::PerformanceMode => "performance-mode",
            Self::Priority => "priority",
            Self::DynamicInput => "dynamic-input",
            Self::ModelCache => "model-cache",
        }
    }
}

/// Snapshot of every capability flag of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Capabilities {
    pub fp16: bool,
    pub performance_mode: bool,
    pub priority: bool,
    pub dynamic_input: bool,
    pub model_cache: bool,
}

impl Capabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Fp16 => self.fp16,
            Capability::PerformanceMode => self.performance_mode,
            Capability::Priority => self.priority,
            Capability::DynamicInput => self.dynamic_input,
            Capability::ModelCache => self.model_cache,
        }
    }

    /// Comma-separated list of supported capabilities, `"none"` if empty.
    pub fn summary(&self) -> String {
        let names: Vec<&str> = Capability::ALL
            .iter()
            .filter(|c| self.supports(**c))
            .map(|c| c.as_str())
            .collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }
}

// ── Performance mode ───────────────────────────────────────────

/// Performance hint passed to the device compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    #[default]
    None,
    Low,
    Medium,
    High,
    Extreme,
}

impl TryFrom<i32> for PerformanceMode {
    type Error = DeviceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            4 => Ok(Self::Extreme),
            other => Err(DeviceError::InvalidParameter(format!(
                "performance mode {other} is outside 0..=4"
            ))),
        }
    }
}

impl FromStr for PerformanceMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "extreme" => Ok(Self::Extreme),
            other => Err(DeviceError::InvalidParameter(format!(
                "unknown performance mode '{other}'"
            ))),
        }
    }
}

// ── Priority ───────────────────────────────────────────────────

/// Scheduling priority passed to the device compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl TryFrom<i32> for Priority {
    type Error = DeviceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(DeviceError::InvalidParameter(format!(
                "priority {other} is outside 0..=3"
            ))),
        }
    }
}

impl FromStr for Priority {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(DeviceError::InvalidParameter(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_range() {
        assert_eq!(PerformanceMode::try_from(0).unwrap(), PerformanceMode::None);
        assert_eq!(PerformanceMode::try_from(4).unwrap(), PerformanceMode::Extreme);
        assert!(PerformanceMode::try_from(5).is_err());
        assert!(PerformanceMode::try_from(-1).is_err());
    }

    #[test]
    fn test_priority_range() {
        assert_eq!(Priority::try_from(3).unwrap(), Priority::High);
        assert!(matches!(
            Priority::try_from(4),
            Err(DeviceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("HIGH".parse::<PerformanceMode>().unwrap(), PerformanceMode::High);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("extreme".parse::<Priority>().is_err());
    }

    #[test]
    fn test_capabilities_summary() {
        let caps = Capabilities {
            fp16: false,
            performance_mode: true,
            priority: false,
            dynamic_input: true,
            model_cache: false,
        };
        assert_eq!(caps.summary(), "performance-mode, dynamic-input");
        assert_eq!(Capabilities::default().summary(), "none");
        assert!(caps.supports(Capability::DynamicInput));
    }
}
