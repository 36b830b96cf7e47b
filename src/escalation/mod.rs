//! User-initiated routing overrides.
//!
//! Precedence is strict: a session-level pinned tier beats an inline hint in
//! the query text, which beats an explicit request parameter. Unparseable
//! hints are ignored and the query falls through to automatic routing. This
//! component never invokes a model.

use moka::sync::Cache;
use serde::Serialize;
use tracing::{debug, info};

use crate::query::Query;
use crate::tier::Tier;

/// Where a resolved override came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideSource {
    /// Pinned on the session via the escalate operation.
    Session,
    /// `@cheap` / `@mid` / `@premium` marker inside the query text.
    Inline,
    /// `explicit_override` request parameter.
    Request,
}

impl OverrideSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideSource::Session => "session",
            OverrideSource::Inline => "inline",
            OverrideSource::Request => "request",
        }
    }
}

/// A resolved escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Override {
    pub tier: Tier,
    pub source: OverrideSource,
}

const DEFAULT_SESSION_CAPACITY: u64 = 100_000;

/// Resolves escalations and holds session pins.
///
/// Pins persist until explicitly cleared (the backing cache is bounded by
/// capacity only, no TTL).
pub struct EscalationManager {
    pins: Cache<String, Tier>,
}

impl EscalationManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            pins: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Pins a tier on a session until [`EscalationManager::clear_session`].
    pub fn pin_session(&self, session_id: &str, tier: Tier, reason: &str) {
        info!(session_id, tier = %tier, reason, "session tier pinned");
        self.pins.insert(session_id.to_string(), tier);
    }

    /// Removes a session pin. Returns the tier that was pinned, if any.
    pub fn clear_session(&self, session_id: &str) -> Option<Tier> {
        let cleared = self.pins.remove(session_id);
        if let Some(tier) = cleared {
            info!(session_id, tier = %tier, "session pin cleared");
        }
        cleared
    }

    /// Returns the pin for a session without resolving a full query.
    pub fn session_pin(&self, session_id: &str) -> Option<Tier> {
        self.pins.get(session_id)
    }

    /// Resolves the override for a query, if any, in strict precedence
    /// order: session pin > inline hint > request parameter.
    pub fn resolve(&self, query: &Query) -> Option<Override> {
        if let Some(session_id) = &query.session_id {
            if let Some(tier) = self.pins.get(session_id) {
                info!(query_id = %query.id, session_id, tier = %tier, "escalation: session pin");
                return Some(Override {
                    tier,
                    source: OverrideSource::Session,
                });
            }
        }

        if let Some(tier) = parse_inline_hint(&query.text) {
            info!(query_id = %query.id, tier = %tier, "escalation: inline hint");
            return Some(Override {
                tier,
                source: OverrideSource::Inline,
            });
        }

        if let Some(tier) = query.explicit_override {
            info!(query_id = %query.id, tier = %tier, "escalation: request parameter");
            return Some(Override {
                tier,
                source: OverrideSource::Request,
            });
        }

        debug!(query_id = %query.id, "no escalation, automatic routing");
        None
    }
}

impl Default for EscalationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EscalationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationManager")
            .field("pinned_sessions", &self.pins.entry_count())
            .finish()
    }
}

/// Extracts a `@tier` marker from query text.
///
/// The first recognized marker wins. Tokens that start with `@` but name no
/// tier (`@everyone`, an email address) are ignored rather than erroring.
pub fn parse_inline_hint(text: &str) -> Option<Tier> {
    text.split_whitespace()
        .filter_map(|token| token.strip_prefix('@'))
        .find_map(|name| Tier::parse(name.trim_end_matches(|c: char| c.is_ascii_punctuation())))
}
