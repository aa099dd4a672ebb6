// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-compilation options handed to the device compiler.

use crate::{PerformanceMode, Priority};

/// Options a device receives together with the graph it compiles.
///
/// The reference back-end persists this as the second cache chunk, so the
/// serde representation is part of the cache format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub enable_fp16: bool,
    #[serde(default)]
    pub performance: PerformanceMode,
    #[serde(default)]
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let c: ModelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, ModelConfig::default());

        let c: ModelConfig =
            serde_json::from_str(r#"{"enable_fp16":true,"performance":"high"}"#).unwrap();
        assert!(c.enable_fp16);
        assert_eq!(c.performance, PerformanceMode::High);
        assert_eq!(c.priority, Priority::None);
    }
}
