// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena capacity parsing.
//!
//! A [`MemoryBudget`] is the byte size of the region handed to the arena.
//! It parses human-readable strings so configuration files and the CLI can
//! say `"32M"` instead of `33554432`.

use crate::ArenaError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Size of the memory region backing an arena.
///
/// # Parsing
/// A decimal number followed by an optional, case-insensitive suffix:
/// `B`, `K`/`KB`/`KiB`, `M`/`MB`/`MiB` or `G`/`GB`/`GiB`. All suffixes
/// are binary multiples.
///
/// # Examples
/// ```
/// use arena_alloc::MemoryBudget;
///
/// let b = MemoryBudget::parse("32M").unwrap();
/// assert_eq!(b.as_bytes(), 32 * 1024 * 1024);
/// assert_eq!(b.to_string(), "32 MB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    /// Creates a budget from a byte count.
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a budget from kibibytes.
    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    /// Creates a budget from mebibytes.
    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    /// Returns the budget in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable budget string.
    pub fn parse(s: &str) -> Result<Self, ArenaError> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, suffix) = trimmed.split_at(split);
        if digits.is_empty() {
            return Err(ArenaError::InvalidBudget(s.to_string()));
        }

        let multiplier = match suffix.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => MIB,
            "G" | "GB" | "GIB" => GIB,
            _ => return Err(ArenaError::InvalidBudget(s.to_string())),
        };

        let bytes = digits
            .parse::<usize>()
            .ok()
            .and_then(|v| v.checked_mul(multiplier))
            .ok_or_else(|| ArenaError::InvalidBudget(s.to_string()))?;
        if bytes == 0 {
            return Err(ArenaError::ZeroBudget);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes;
        if b >= GIB && b % GIB == 0 {
            write!(f, "{} GB", b / GIB)
        } else if b >= MIB && b % MIB == 0 {
            write!(f, "{} MB", b / MIB)
        } else if b >= KIB && b % KIB == 0 {
            write!(f, "{} KB", b / KIB)
        } else {
            write!(f, "{b} B")
        }
    }
}

impl std::str::FromStr for MemoryBudget {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemoryBudget {
    type Error = ArenaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MemoryBudget> for String {
    fn from(b: MemoryBudget) -> Self {
        b.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(MemoryBudget::parse("32M").unwrap().as_bytes(), 32 * MIB);
        assert_eq!(MemoryBudget::parse("32mb").unwrap().as_bytes(), 32 * MIB);
        assert_eq!(MemoryBudget::parse("64KiB").unwrap().as_bytes(), 64 * KIB);
        assert_eq!(MemoryBudget::parse("1G").unwrap().as_bytes(), GIB);
        assert_eq!(MemoryBudget::parse("4096").unwrap().as_bytes(), 4096);
        assert_eq!(MemoryBudget::parse(" 16 K ").unwrap().as_bytes(), 16 * KIB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(MemoryBudget::parse(""), Err(ArenaError::InvalidBudget(_))));
        assert!(matches!(MemoryBudget::parse("M"), Err(ArenaError::InvalidBudget(_))));
        assert!(matches!(MemoryBudget::parse("12X"), Err(ArenaError::InvalidBudget(_))));
        assert!(matches!(MemoryBudget::parse("0K"), Err(ArenaError::ZeroBudget)));
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_mb(32).to_string(), "32 MB");
        assert_eq!(MemoryBudget::from_kb(3).to_string(), "3 KB");
        assert_eq!(MemoryBudget::from_bytes(100).to_string(), "100 B");
    }

    #[test]
    fn test_serde_as_string() {
        let b: MemoryBudget = serde_json::from_str("\"256K\"").unwrap();
        assert_eq!(b, MemoryBudget::from_kb(256));
        assert_eq!(serde_json::to_string(&b).unwrap(), "\"256 KB\"");
    }
}
