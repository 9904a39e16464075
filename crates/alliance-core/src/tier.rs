//! Partner tier enumeration.
//!
//! Tiers arrive from the PRM as display strings. Modeling them as a closed
//! enum means an unrecognized tier fails eligibility instead of silently
//! defaulting to some catch-all level.

use serde::{Deserialize, Serialize};

/// Program tier of a partner company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnerTier {
    /// Top tier, full program benefits.
    Premier,
    /// Mid tier, certification track.
    Certified,
    /// Entry tier.
    Registered,
    /// Aggregates smaller resellers under one agreement.
    Aggregator,
    /// Distribution-only relationship.
    Distributor,
}

impl PartnerTier {
    /// All known tiers, in descending program rank.
    pub const ALL: [PartnerTier; 5] = [
        PartnerTier::Premier,
        PartnerTier::Certified,
        PartnerTier::Registered,
        PartnerTier::Aggregator,
        PartnerTier::Distributor,
    ];

    /// Parses a PRM tier string, case-insensitively.
    ///
    /// Returns `None` for unknown values; callers treat that as an
    /// eligibility failure rather than defaulting.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "premier" => Some(Self::Premier),
            "certified" => Some(Self::Certified),
            "registered" => Some(Self::Registered),
            "aggregator" => Some(Self::Aggregator),
            "distributor" => Some(Self::Distributor),
            _ => None,
        }
    }

    /// Canonical display string, as stored in the local store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premier => "Premier",
            Self::Certified => "Certified",
            Self::Registered => "Registered",
            Self::Aggregator => "Aggregator",
            Self::Distributor => "Distributor",
        }
    }

    /// NPCU units a partner at this tier must accumulate per program year.
    #[must_use]
    pub fn npcu_requirement(&self) -> u32 {
        match self {
            Self::Premier => 120,
            Self::Certified => 60,
            Self::Registered => 20,
            Self::Aggregator => 0,
            Self::Distributor => 0,
        }
    }
}

impl std::fmt::Display for PartnerTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
