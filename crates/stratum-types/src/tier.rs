//! Cache tier classification.

use serde::{Deserialize, Serialize};

/// One of the three eviction domains a cache entry can occupy.
///
/// Tiers are ordered hottest first; that order is also the lock acquisition
/// order whenever an operation touches more than one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Small, short-lived, least-recently-used eviction.
    Hot,
    /// Medium, evicts the lowest eviction score.
    Warm,
    /// Large, long-lived, first-in-first-out eviction.
    Cold,
}

impl Tier {
    /// All tiers, hottest first.
    pub const ALL: [Tier; 3] = [Tier::Hot, Tier::Warm, Tier::Cold];

    /// Lowercase name used in logs and configuration.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Cold => "cold",
        }
    }

    /// Tier an entry moves to when promoted. Hot stays Hot.
    pub fn hotter(self) -> Tier {
        match self {
            Tier::Hot | Tier::Warm => Tier::Hot,
            Tier::Cold => Tier::Warm,
        }
    }

    /// Tier an entry moves to when demoted, if any.
    pub fn colder(self) -> Option<Tier> {
        match self {
            Tier::Hot => Some(Tier::Warm),
            Tier::Warm => Some(Tier::Cold),
            Tier::Cold => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hot" => Ok(Tier::Hot),
            "warm" => Ok(Tier::Warm),
            "cold" => Ok(Tier::Cold),
            other => Err(format!("unknown tier '{other}' (expected hot, warm or cold)")),
        }
    }
}
