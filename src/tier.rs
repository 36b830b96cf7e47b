//! Model tiers and their pricing.

use serde::{Deserialize, Serialize};

/// A selectable model capability/cost level.
///
/// Ordering is by capability: `Cheap < Mid < Premium`. Routing rules rely on
/// this when escalating, and the monotonicity property of length-based
/// routing is expressed against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Cheap,
    Mid,
    Premium,
}

impl Tier {
    /// All tiers in ascending capability order.
    pub const ALL: [Tier; 3] = [Tier::Cheap, Tier::Mid, Tier::Premium];

    /// Parses a tier name, case-insensitively. Returns `None` for anything
    /// unrecognized (callers treat that as "no hint", never an error).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cheap" => Some(Tier::Cheap),
            "mid" => Some(Tier::Mid),
            "premium" => Some(Tier::Premium),
            _ => None,
        }
    }

    /// Returns the lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Cheap => "cheap",
            Tier::Mid => "mid",
            Tier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// USD pricing per 1k tokens for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl TierPricing {
    /// Cost of a request with the given actual token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000.0) * self.input_per_1k
            + (output_tokens as f64 / 1_000.0) * self.output_per_1k
    }
}

/// Binding of a tier to a concrete provider model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    /// Provider model name (e.g. `gpt-4o-mini`).
    pub model: String,
    /// Response token ceiling passed to the provider.
    pub max_tokens: u32,
    pub pricing: TierPricing,
}
