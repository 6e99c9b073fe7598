//! Harvest domain models
//!
//! Status values are stored as uppercase strings in the database; the
//! enums here are the single place that knows which values exist and
//! which transitions are allowed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Produce grade assigned to a weighed crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::A, Grade::B, Grade::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            _ => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harvest record workflow status
///
/// Forward-only: DRAFT -> SUBMITTED -> APPROVED. There is no rejection
/// state; corrections to a submitted record go through override-gated
/// edits instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HarvestStatus {
    Draft,
    Submitted,
    Approved,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStatus::Draft => "DRAFT",
            HarvestStatus::Submitted => "SUBMITTED",
            HarvestStatus::Approved => "APPROVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(HarvestStatus::Draft),
            "SUBMITTED" => Some(HarvestStatus::Submitted),
            "APPROVED" => Some(HarvestStatus::Approved),
            _ => None,
        }
    }

    /// Transition table for the harvest record state machine
    pub fn allowed_transitions(&self) -> &'static [HarvestStatus] {
        match self {
            HarvestStatus::Draft => &[HarvestStatus::Submitted],
            HarvestStatus::Submitted => &[HarvestStatus::Approved],
            HarvestStatus::Approved => &[],
        }
    }

    pub fn can_transition_to(&self, next: HarvestStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether crate and record mutations are allowed without the
    /// override capability
    pub fn is_mutable(&self) -> bool {
        matches!(self, HarvestStatus::Draft)
    }
}

impl fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Production cycle status, as recorded by the cycle management module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleStatus {
    Planned,
    Active,
    Harvesting,
    Completed,
    Cancelled,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Planned => "PLANNED",
            CycleStatus::Active => "ACTIVE",
            CycleStatus::Harvesting => "HARVESTING",
            CycleStatus::Completed => "COMPLETED",
            CycleStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PLANNED" => Some(CycleStatus::Planned),
            "ACTIVE" => Some(CycleStatus::Active),
            "HARVESTING" => Some(CycleStatus::Harvesting),
            "COMPLETED" => Some(CycleStatus::Completed),
            "CANCELLED" => Some(CycleStatus::Cancelled),
            _ => None,
        }
    }

    /// Harvest records may only be created while the cycle is growing
    /// or actively being picked
    pub fn allows_harvest(&self) -> bool {
        matches!(self, CycleStatus::Active | CycleStatus::Harvesting)
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
