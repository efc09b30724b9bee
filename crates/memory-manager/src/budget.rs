// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device memory budgets.

use std::fmt;
use std::str::FromStr;

use crate::MemoryError;

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

/// Upper bound on the bytes a device may hand out for execution buffers.
///
/// Budgets are written in configuration as `"512M"`, `"1G"`, `"64KB"` or a
/// plain byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn from_gb(gb: usize) -> Self {
        Self { bytes: gb * GIB }
    }

    /// A budget no allocation can exceed.
    pub fn unlimited() -> Self {
        Self { bytes: usize::MAX }
    }

    pub fn is_unlimited(&self) -> bool {
        self.bytes == usize::MAX
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable budget, case-insensitively.
    ///
    /// ```
    /// use memory_manager::MemoryBudget;
    /// assert_eq!(MemoryBudget::parse("512M").unwrap(), MemoryBudget::from_mb(512));
    /// assert_eq!(MemoryBudget::parse("2kb").unwrap().as_bytes(), 2048);
    /// assert!(MemoryBudget::parse("0").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let invalid = || MemoryError::InvalidBudget(s.to_string());
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, mult)))
            .unwrap_or((upper.as_str(), 1));

        let value: usize = digits.trim().parse().map_err(|_| invalid())?;
        match value.checked_mul(multiplier) {
            Some(0) | None => Err(invalid()),
            Some(bytes) => Ok(Self { bytes }),
        }
    }
}

impl FromStr for MemoryBudget {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            return f.write_str("unlimited");
        }
        match self.bytes {
            b if b >= GIB && b % GIB == 0 => write!(f, "{}G", b / GIB),
            b if b >= MIB && b % MIB == 0 => write!(f, "{}M", b / MIB),
            b if b >= KIB && b % KIB == 0 => write!(f, "{}K", b / KIB),
            b => write!(f, "{b}"),
        }
    }
}
