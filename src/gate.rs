//! The access gate: an ordered rule set and the per-request decision scan.
//!
//! A [`RuleSet`] holds rules in stored order and evaluates one request as a
//! single linear scan with three terminal outcomes: allow because no rule
//! matched (default-open), allow because the first matching rule's condition
//! was satisfied, or deny because it was not. The first matching rule's
//! verdict is final — later, possibly more permissive rules are never
//! consulted.

use crate::path;
use crate::rule::{Principal, Rule};

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the request proceed.
    Allow,
    /// Terminate the request with 403 Forbidden.
    Deny,
}

impl Decision {
    /// Check whether the request may proceed.
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Check whether the request must be blocked.
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }
}

/// An ordered set of protected-directory rules.
///
/// Immutable for the duration of one evaluation; concurrent administrator
/// edits are expected to swap in a whole new snapshot, never mutate one in
/// place.
///
/// # Example
/// ```
/// use axum_dirgate::{RuleSet, Rule, Principal, Decision};
///
/// let rules = RuleSet::builder()
///     .rule(Rule::new("/members").restrict_children(true).allow_role("editor"))
///     .build();
///
/// let editor = Principal::logged_in(["editor"], "198.51.100.1");
/// assert_eq!(rules.evaluate("/members/reports", &editor, false), Decision::Allow);
///
/// let visitor = Principal::anonymous("198.51.100.1");
/// assert_eq!(rules.evaluate("/members/reports", &visitor, false), Decision::Deny);
///
/// // Paths with no configured rule are unrestricted.
/// assert_eq!(rules.evaluate("/public", &visitor, false), Decision::Allow);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Create an empty rule set (everything allowed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rule set from rules in evaluation order.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Create a builder for constructing a rule set.
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::new()
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate a request against the rule set.
    ///
    /// `raw_uri` is the request URI as received; the query string is
    /// stripped and the path normalized before matching. `bypass` is for
    /// privileged contexts (e.g. administrators) and allows immediately
    /// without scanning any rule.
    ///
    /// Fail-open edges, preserved deliberately: an empty request path, an
    /// empty rule set, and a path no rule governs all yield
    /// [`Decision::Allow`].
    pub fn evaluate(&self, raw_uri: &str, principal: &Principal, bypass: bool) -> Decision {
        self.evaluate_with_match(raw_uri, principal, bypass).0
    }

    /// Evaluate and also report which rule decided, as an index into
    /// [`rules`](Self::rules). `None` means no rule matched (or the scan
    /// was bypassed).
    pub fn evaluate_with_match(
        &self,
        raw_uri: &str,
        principal: &Principal,
        bypass: bool,
    ) -> (Decision, Option<usize>) {
        if bypass {
            tracing::trace!(uri = raw_uri, "gate bypassed for privileged context");
            return (Decision::Allow, None);
        }

        let request_path = path::request_path(raw_uri);
        if request_path.is_empty() || self.rules.is_empty() {
            return (Decision::Allow, None);
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            if !rule.active || rule.path.is_empty() {
                continue;
            }
            if !rule.matches_path(&request_path) {
                continue;
            }

            // First matching rule's verdict is final.
            let decision = if rule.allows(principal) {
                Decision::Allow
            } else {
                Decision::Deny
            };
            tracing::debug!(
                path = %request_path,
                rule_path = %rule.path,
                rule_index = idx,
                logged_in = principal.logged_in,
                ip = %principal.source_ip,
                decision = ?decision,
                "gate rule matched"
            );
            return (decision, Some(idx));
        }

        tracing::debug!(path = %request_path, "no gate rule matched, allowing");
        (Decision::Allow, None)
    }

    /// Check whether the request may proceed.
    pub fn is_allowed(&self, raw_uri: &str, principal: &Principal, bypass: bool) -> bool {
        self.evaluate(raw_uri, principal, bypass).is_allow()
    }
}

/// Builder for constructing a [`RuleSet`] in evaluation order.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Rules are evaluated in insertion order.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append several rules at once.
    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Build the rule set.
    pub fn build(self) -> RuleSet {
        RuleSet { rules: self.rules }
    }
}

/// Trait for types that supply the currently persisted rule set.
///
/// The gate itself never holds process-wide state; the host fetches a
/// snapshot per request (or caches one) through this seam. Pass a provider
/// to [`DirGateLayer::from_provider`](crate::DirGateLayer::from_provider)
/// to have the middleware load rules on every request.
///
/// # Example
/// ```
/// use axum_dirgate::{RuleProvider, RuleSet, Rule};
///
/// struct FixtureProvider;
///
/// impl RuleProvider for FixtureProvider {
///     type Error = std::convert::Infallible;
///
///     fn load_rules(&self) -> Result<RuleSet, Self::Error> {
///         Ok(RuleSet::from_rules([Rule::new("/secret").allow_role("editor")]))
///     }
/// }
/// ```
pub trait RuleProvider: Send + Sync {
    /// Error type for rule loading failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the current rule set snapshot.
    fn load_rules(&self) -> Result<RuleSet, Self::Error>;
}

/// A provider that returns a fixed, in-memory rule set.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleProvider {
    rules: RuleSet,
}

impl StaticRuleProvider {
    /// Create a provider around an existing rule set.
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }
}

impl RuleProvider for StaticRuleProvider {
    type Error = std::convert::Infallible;

    fn load_rules(&self) -> Result<RuleSet, Self::Error> {
        Ok(self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Group, UserIpEntry};

    fn admin_area_rule() -> Rule {
        Rule::new("/admin-area")
            .restrict_children(true)
            .allow_role("editor")
            .group(Group::new("office").user(UserIpEntry::from_text("alice", "203.0.113.7")))
    }

    #[test]
    fn test_empty_rule_set_allows() {
        let rules = RuleSet::new();
        let visitor = Principal::anonymous("1.2.3.4");
        assert_eq!(rules.evaluate("/anything", &visitor, false), Decision::Allow);
    }

    #[test]
    fn test_empty_request_path_allows() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let visitor = Principal::anonymous("1.2.3.4");
        assert_eq!(rules.evaluate("", &visitor, false), Decision::Allow);
    }

    #[test]
    fn test_bypass_skips_rule_scan() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let visitor = Principal::anonymous("1.2.3.4");
        assert_eq!(rules.evaluate("/admin-area/page", &visitor, true), Decision::Allow);
    }

    #[test]
    fn test_unmatched_path_allows() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let visitor = Principal::anonymous("1.2.3.4");
        assert_eq!(rules.evaluate("/unconfigured", &visitor, false), Decision::Allow);
    }

    #[test]
    fn test_wrong_role_and_unlisted_ip_denies() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let subscriber = Principal::logged_in(["subscriber"], "9.9.9.9");
        assert_eq!(
            rules.evaluate("/admin-area/page", &subscriber, false),
            Decision::Deny
        );
    }

    #[test]
    fn test_allowed_role_allows() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let editor = Principal::logged_in(["editor"], "9.9.9.9");
        assert_eq!(rules.evaluate("/admin-area/page", &editor, false), Decision::Allow);
    }

    #[test]
    fn test_listed_ip_allows_anonymous() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let visitor = Principal::anonymous("203.0.113.7");
        assert_eq!(rules.evaluate("/admin-area/page", &visitor, false), Decision::Allow);
    }

    #[test]
    fn test_query_string_is_ignored() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let editor = Principal::logged_in(["editor"], "9.9.9.9");
        assert_eq!(
            rules.evaluate("/admin-area/page?preview=1", &editor, false),
            Decision::Allow
        );
    }

    #[test]
    fn test_inactive_rule_is_skipped() {
        let rules = RuleSet::from_rules([admin_area_rule().active(false)]);
        let visitor = Principal::anonymous("1.2.3.4");
        assert_eq!(rules.evaluate("/admin-area/page", &visitor, false), Decision::Allow);
    }

    #[test]
    fn test_empty_path_rule_is_skipped() {
        let rules = RuleSet::from_rules([Rule::new(""), admin_area_rule()]);
        let editor = Principal::logged_in(["editor"], "9.9.9.9");
        let (decision, matched) = rules.evaluate_with_match("/admin-area", &editor, false);
        assert_eq!(decision, Decision::Allow);
        assert_eq!(matched, Some(1));
    }

    #[test]
    fn test_first_match_deny_is_final() {
        // A later, more permissive rule for the same path must not rescue
        // the request.
        let rules = RuleSet::builder()
            .rule(Rule::new("/secret").restrict_children(true).allow_role("editor"))
            .rule(
                Rule::new("/secret")
                    .restrict_children(true)
                    .allow_role("subscriber"),
            )
            .build();
        let subscriber = Principal::logged_in(["subscriber"], "1.2.3.4");
        let (decision, matched) = rules.evaluate_with_match("/secret/a", &subscriber, false);
        assert_eq!(decision, Decision::Deny);
        assert_eq!(matched, Some(0));
    }

    #[test]
    fn test_rules_scanned_in_stored_order() {
        let rules = RuleSet::builder()
            .rule(Rule::new("/a").allow_role("editor"))
            .rule(Rule::new("/b").allow_role("editor"))
            .build();
        let editor = Principal::logged_in(["editor"], "1.2.3.4");
        assert_eq!(rules.evaluate_with_match("/b", &editor, false).1, Some(1));
    }

    #[test]
    fn test_sibling_path_is_not_governed() {
        let rules = RuleSet::from_rules([admin_area_rule()]);
        let visitor = Principal::anonymous("1.2.3.4");
        assert_eq!(rules.evaluate("/admin-area2", &visitor, false), Decision::Allow);
    }

    #[test]
    fn test_static_provider_round_trip() {
        let provider = StaticRuleProvider::new(RuleSet::from_rules([admin_area_rule()]));
        let rules = provider.load_rules().unwrap();
        assert_eq!(rules.rules().len(), 1);
    }
}
