//! Domains: the fixed-order partition of configuration modules
//!
//! A domain is named by a directory `NN_label` under the spec root, where
//! `NN` is its rank. `00_core` comes first, then `01_foundation`,
//! `02_operation`, `03_agency`, `04_volition` and the two extension slots
//! `05_*` and `06_*`. Anything outside a recognised domain sorts last.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Highest recognised domain rank.
pub const MAX_DOMAIN_RANK: u8 = 6;

const UNASSIGNED_RANK: u16 = 999;
const UNASSIGNED_NAME: &str = "unknown";

/// A configuration domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    rank: u16,
    name: String,
}

impl Domain {
    /// Recognise a directory name such as `01_foundation`.
    pub fn from_dir_name(dir: &str) -> Option<Self> {
        let (prefix, label) = dir.split_once('_')?;
        if prefix.len() != 2 || !prefix.bytes().all(|b| b.is_ascii_digit()) || label.is_empty() {
            return None;
        }
        let rank: u8 = prefix.parse().ok()?;
        if rank > MAX_DOMAIN_RANK {
            return None;
        }
        Some(Self {
            rank: rank as u16,
            name: dir.to_string(),
        })
    }

    /// The first recognised domain component of a path relative to the spec root.
    pub fn detect(rel_path: &Path) -> Self {
        rel_path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| c.as_os_str().to_str())
            .find_map(Self::from_dir_name)
            .unwrap_or_else(Self::unassigned)
    }

    /// Modules living outside any recognised domain.
    pub fn unassigned() -> Self {
        Self {
            rank: UNASSIGNED_RANK,
            name: UNASSIGNED_NAME.to_string(),
        }
    }

    pub fn rank(&self) -> u16 {
        self.rank
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_recognised(&self) -> bool {
        self.rank != UNASSIGNED_RANK
    }

    /// Two-digit prefix, e.g. `01` (empty for unassigned modules).
    pub fn prefix(&self) -> &str {
        if self.is_recognised() {
            &self.name[..2]
        } else {
            ""
        }
    }

    /// Label after the prefix, e.g. `foundation`.
    pub fn label(&self) -> &str {
        self.name
            .split_once('_')
            .map(|(_, label)| label)
            .unwrap_or(&self.name)
    }

    /// Whether a user selector (`01`, `foundation`, `01_foundation`) names this domain.
    pub fn matches_selector(&self, selector: &str) -> bool {
        if !self.is_recognised() {
            return false;
        }
        let selector = selector.trim().to_ascii_lowercase();
        selector == self.name.to_ascii_lowercase()
            || selector == self.prefix()
            || selector == self.label().to_ascii_lowercase()
    }
}

impl Ord for Domain {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Domain {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
