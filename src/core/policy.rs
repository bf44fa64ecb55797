//! Route-pattern policy matching for the authentication gate.
//!
//! Patterns come from `route_configuration`: glob-style strings where `*`
//! matches any run of characters (including none) and everything else matches
//! literally, case-insensitively, against the whole request URL. Patterns are
//! compiled once at construction so the per-request check stays allocation-free.
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::config::models::RoutePolicy;

/// Compile a glob-style route pattern into an anchored, case-insensitive regex.
pub fn compile_route_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let translated = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".{0,}");

    RegexBuilder::new(&format!("^{translated}$"))
        .case_insensitive(true)
        .build()
}

struct PolicyRule {
    pattern: String,
    regex: Regex,
    refresh_on_invalid_token: bool,
}

/// Pre-compiled route policy table consulted on every failed authentication.
pub struct RoutePolicyMatcher {
    rules: Vec<PolicyRule>,
}

impl RoutePolicyMatcher {
    /// Compile the configured pattern map. Rules are ordered by pattern text
    /// so first-match semantics are deterministic across runs.
    pub fn new(route_configuration: &HashMap<String, RoutePolicy>) -> Result<Self, regex::Error> {
        let mut rules = Vec::with_capacity(route_configuration.len());
        for (pattern, policy) in route_configuration {
            rules.push(PolicyRule {
                pattern: pattern.clone(),
                regex: compile_route_pattern(pattern)?,
                refresh_on_invalid_token: policy.refresh_on_invalid_token,
            });
        }
        rules.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        Ok(Self { rules })
    }

    /// An empty matcher that never requests a refresh.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Whether the first pattern matching `url` requests a soft refresh
    /// instead of a hard reject. No match means hard reject.
    pub fn refresh_on_invalid(&self, url: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(url))
            .map(|rule| rule.refresh_on_invalid_token)
            .unwrap_or(false)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::RoutePolicy;

    fn matcher(entries: &[(&str, bool)]) -> RoutePolicyMatcher {
        let map = entries
            .iter()
            .map(|(pattern, refresh)| {
                (
                    pattern.to_string(),
                    RoutePolicy {
                        refresh_on_invalid_token: *refresh,
                    },
                )
            })
            .collect();
        RoutePolicyMatcher::new(&map).unwrap()
    }

    #[test]
    fn wildcard_matches_any_suffix() {
        let m = matcher(&[("/admin/*", true)]);
        assert!(m.refresh_on_invalid("/admin/users"));
        assert!(m.refresh_on_invalid("/admin/"));
        assert!(!m.refresh_on_invalid("/admin")); // pattern requires the slash
        assert!(!m.refresh_on_invalid("/public/info"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let m = matcher(&[("/Admin/*", true)]);
        assert!(m.refresh_on_invalid("/admin/users"));
        assert!(m.refresh_on_invalid("/ADMIN/USERS"));
    }

    #[test]
    fn match_is_anchored_to_the_whole_url() {
        let m = matcher(&[("/admin", true)]);
        assert!(m.refresh_on_invalid("/admin"));
        assert!(!m.refresh_on_invalid("/admin/users"));
        assert!(!m.refresh_on_invalid("/x/admin"));
    }

    #[test]
    fn regex_metacharacters_in_patterns_are_literal() {
        let m = matcher(&[("/a.b/*", true)]);
        assert!(m.refresh_on_invalid("/a.b/c"));
        assert!(!m.refresh_on_invalid("/aXb/c"));
    }

    #[test]
    fn unmatched_url_means_hard_reject() {
        let m = matcher(&[("/admin/*", true)]);
        assert!(!m.refresh_on_invalid("/public/info"));
        assert!(!RoutePolicyMatcher::empty().refresh_on_invalid("/anything"));
    }

    #[test]
    fn first_match_in_sorted_order_wins() {
        let m = matcher(&[("/admin/*", true), ("/admin/audit*", false)]);
        // "/admin/*" sorts before "/admin/audit*" and both match.
        assert!(m.refresh_on_invalid("/admin/audit/log"));
    }

    #[test]
    fn wildcard_in_the_middle_of_a_pattern() {
        let m = matcher(&[("/api/*/export", true)]);
        assert!(m.refresh_on_invalid("/api/orders/export"));
        assert!(!m.refresh_on_invalid("/api/orders/import"));
    }
}
