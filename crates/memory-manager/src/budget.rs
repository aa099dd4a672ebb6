// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory budget configuration and parsing.

use crate::MemoryError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Suffixes accepted by [`MemoryBudget::parse`], longest first.
const SUFFIXES: &[(&str, usize)] = &[
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// A hard ceiling on the device memory a pool may hand out.
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b = MemoryBudget::parse("256M").unwrap();
/// assert_eq!(b.as_mb(), 256);
/// assert_eq!(MemoryBudget::parse("4096").unwrap().as_bytes(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    /// Creates a budget from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a budget from megabytes.
    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    /// Returns the budget in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the budget in megabytes (truncated).
    pub fn as_mb(&self) -> usize {
        self.bytes / MIB
    }

    /// Parses `"512M"`, `"1GB"`, `"64k"` or a plain byte count.
    /// Case-insensitive; zero is rejected.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, mult)| {
                upper
                    .strip_suffix(suffix)
                    .map(|rest| (rest.trim().to_string(), mult))
            })
            .unwrap_or_else(|| (upper.clone(), 1));

        let bytes = digits
            .parse::<usize>()
            .ok()
            .and_then(|v| v.checked_mul(multiplier))
            .filter(|&b| b > 0)
            .ok_or_else(|| MemoryError::InvalidBudget(s.to_string()))?;

        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= GIB && self.bytes % GIB == 0 {
            write!(f, "{} GB", self.bytes / GIB)
        } else if self.bytes >= MIB {
            write!(f, "{:.1} MB", self.bytes as f64 / MIB as f64)
        } else {
            write!(f, "{} bytes", self.bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(MemoryBudget::parse("512M").unwrap().as_mb(), 512);
        assert_eq!(MemoryBudget::parse("512mb").unwrap().as_mb(), 512);
        assert_eq!(MemoryBudget::parse("1G").unwrap().as_bytes(), GIB);
        assert_eq!(MemoryBudget::parse("64K").unwrap().as_bytes(), 64 * KIB);
        assert_eq!(MemoryBudget::parse(" 100B ").unwrap().as_bytes(), 100);
        assert_eq!(MemoryBudget::parse("4096").unwrap().as_bytes(), 4096);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(MemoryBudget::parse("").is_err());
        assert!(MemoryBudget::parse("0M").is_err());
        assert!(MemoryBudget::parse("lots").is_err());
        assert!(MemoryBudget::parse("-5M").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_mb(2048).to_string(), "2 GB");
        assert_eq!(MemoryBudget::from_mb(3).to_string(), "3.0 MB");
        assert_eq!(MemoryBudget::from_bytes(10).to_string(), "10 bytes");
    }
}
