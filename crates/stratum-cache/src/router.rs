//! Key → tier routing.
//!
//! The cache never interprets keys itself. A [`TierRouter`] decides where a
//! freshly stored key lands; the default [`PrefixRouter`] is a small routing
//! table of key prefixes.

use stratum_types::Tier;

/// Decides the initial tier of a key on `put`.
pub trait TierRouter: Send + Sync {
    /// Tier a newly stored `key` is placed in.
    fn route(&self, key: &str) -> Tier;
}

impl<F> TierRouter for F
where
    F: Fn(&str) -> Tier + Send + Sync,
{
    fn route(&self, key: &str) -> Tier {
        self(key)
    }
}

/// Routing table matching key prefixes, first match wins.
#[derive(Debug, Clone)]
pub struct PrefixRouter {
    routes: Vec<(String, Tier)>,
    fallback: Tier,
}

impl PrefixRouter {
    /// Empty table sending every key to `fallback`.
    pub fn new(fallback: Tier) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    /// Append a prefix rule.
    pub fn with_route(mut self, prefix: impl Into<String>, tier: Tier) -> Self {
        self.routes.push((prefix.into(), tier));
        self
    }

    /// Rules in match order.
    pub fn routes(&self) -> &[(String, Tier)] {
        &self.routes
    }

    /// Tier used when no prefix matches.
    pub fn fallback(&self) -> Tier {
        self.fallback
    }
}

impl Default for PrefixRouter {
    /// Identity and session keys are hot, catalog and reference data warm,
    /// everything else cold.
    fn default() -> Self {
        Self::new(Tier::Cold)
            .with_route("session:", Tier::Hot)
            .with_route("user:", Tier::Hot)
            .with_route("auth:", Tier::Hot)
            .with_route("catalog:", Tier::Warm)
            .with_route("reference:", Tier::Warm)
    }
}

impl TierRouter for PrefixRouter {
    fn route(&self, key: &str) -> Tier {
        self.routes
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, tier)| *tier)
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let router = PrefixRouter::default();
        assert_eq!(router.route("session:abc"), Tier::Hot);
        assert_eq!(router.route("auth:token"), Tier::Hot);
        assert_eq!(router.route("catalog:42"), Tier::Warm);
        assert_eq!(router.route("report:2024"), Tier::Cold);
        assert_eq!(router.route(""), Tier::Cold);
    }

    #[test]
    fn test_first_match_wins() {
        let router = PrefixRouter::new(Tier::Cold)
            .with_route("user:admin", Tier::Hot)
            .with_route("user:", Tier::Warm);
        assert_eq!(router.route("user:admin:1"), Tier::Hot);
        assert_eq!(router.route("user:bob"), Tier::Warm);
    }

    #[test]
    fn test_closure_router() {
        let router = |key: &str| {
            if key.len() > 8 { Tier::Cold } else { Tier::Hot }
        };
        assert_eq!(TierRouter::route(&router, "short"), Tier::Hot);
        assert_eq!(TierRouter::route(&router, "much-longer-key"), Tier::Cold);
    }
}
