//! Protected-directory rules and the authorization decision they encode.
//!
//! A [`Rule`] scopes an allow condition to one normalized path (optionally
//! covering every path nested under it). The allow condition has two tiers,
//! checked in order:
//!
//! 1. **Roles**: a logged-in principal holding any of the rule's allowed
//!    roles is allowed unconditionally.
//! 2. **IP allow-list**: otherwise, the principal's source IP is compared
//!    against every IP listed in the rule's extra groups; any exact match
//!    allows.
//!
//! Usernames on allow-list entries are labels for the administrator's
//! bookkeeping only — they are never compared against the requester's
//! identity. Any listed IP under an allowed group grants access.

use crate::ip;
use crate::path;
use std::collections::HashSet;

/// The requester's derived identity for one request.
///
/// Built per request from the host's session/transport information; never
/// persisted.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Whether the requester is an authenticated user.
    pub logged_in: bool,
    /// Role identifiers held by the requester.
    pub roles: HashSet<String>,
    /// Source IP from the transport-layer peer address. May be empty or
    /// invalid, in which case the IP allow-list tier never matches.
    pub source_ip: String,
}

impl Principal {
    /// Create a principal for a logged-in user.
    pub fn logged_in(
        roles: impl IntoIterator<Item = impl Into<String>>,
        source_ip: impl Into<String>,
    ) -> Self {
        Self {
            logged_in: true,
            roles: roles.into_iter().map(Into::into).collect(),
            source_ip: source_ip.into(),
        }
    }

    /// Create an anonymous principal with only a source IP.
    pub fn anonymous(source_ip: impl Into<String>) -> Self {
        Self {
            logged_in: false,
            roles: HashSet::new(),
            source_ip: source_ip.into(),
        }
    }
}

/// A labelled entry in an allow-list group: a username label plus the IPs
/// that entry contributes.
#[derive(Debug, Clone, Default)]
pub struct UserIpEntry {
    /// Label only. Never matched against the requester's identity.
    pub username: String,
    /// Validated IP literals, de-duplicated, first-occurrence order.
    pub ips: Vec<String>,
}

impl UserIpEntry {
    /// Create an entry with an already-validated IP list.
    pub fn new(
        username: impl Into<String>,
        ips: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            username: username.into(),
            ips: ips.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an entry by parsing a free-text IP block (tab/newline
    /// separated; invalid literals are silently dropped).
    pub fn from_text(username: impl Into<String>, ips_text: &str) -> Self {
        Self {
            username: username.into(),
            ips: ip::parse_ip_block(ips_text),
        }
    }
}

/// A named bundle of allow-list entries.
///
/// The name is a label only; grouping has no effect on the decision — any
/// IP in any group of a rule allows.
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// Display label for the administrator.
    pub name: String,
    /// Allow-list entries in stored order.
    pub users: Vec<UserIpEntry>,
}

impl Group {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: Vec::new(),
        }
    }

    /// Add an allow-list entry to the group.
    pub fn user(mut self, entry: UserIpEntry) -> Self {
        self.users.push(entry);
        self
    }
}

/// A path-scoped access policy.
///
/// # Example
/// ```
/// use axum_dirgate::{Rule, Group, UserIpEntry, Principal};
///
/// let rule = Rule::new("/members/reports")
///     .restrict_children(true)
///     .allow_role("editor")
///     .group(Group::new("office")
///         .user(UserIpEntry::from_text("alice", "203.0.113.7")));
///
/// let editor = Principal::logged_in(["editor"], "198.51.100.1");
/// assert!(rule.allows(&editor));
///
/// let visitor = Principal::anonymous("203.0.113.7");
/// assert!(rule.allows(&visitor));
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    /// Normalized protected path. A rule with an empty path is never
    /// considered by the gate.
    pub path: String,
    /// Whether the rule also governs every path nested under `path`.
    pub restrict_children: bool,
    /// Inactive rules are skipped entirely during evaluation.
    pub active: bool,
    /// Role identifiers that grant access unconditionally.
    pub allowed_roles: HashSet<String>,
    /// Extra groups holding IP allow-list entries.
    pub groups: Vec<Group>,
}

impl Rule {
    /// Create an active rule for the given path.
    ///
    /// The path is normalized here, so both `"secret/"` and `"/secret"`
    /// produce a rule for `/secret`.
    pub fn new(rule_path: impl AsRef<str>) -> Self {
        Self {
            path: path::normalize(rule_path.as_ref()),
            restrict_children: false,
            active: true,
            allowed_roles: HashSet::new(),
            groups: Vec::new(),
        }
    }

    /// Set whether nested paths are governed too.
    pub fn restrict_children(mut self, restrict: bool) -> Self {
        self.restrict_children = restrict;
        self
    }

    /// Set whether the rule is active.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Add a role that grants access unconditionally.
    pub fn allow_role(mut self, role: impl Into<String>) -> Self {
        self.allowed_roles.insert(role.into());
        self
    }

    /// Add several allowed roles at once.
    pub fn allow_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add an allow-list group.
    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Decide whether this rule governs `request_path`.
    ///
    /// Both sides are assumed already normalized. Without
    /// `restrict_children` only exact equality matches; with it, nested
    /// paths match on a full segment boundary, so `/secret2` never matches
    /// a rule for `/secret`.
    pub fn matches_path(&self, request_path: &str) -> bool {
        match request_path.strip_prefix(self.path.as_str()) {
            Some("") => true,
            Some(rest) => self.restrict_children && rest.starts_with('/'),
            None => false,
        }
    }

    /// Decide whether `principal` satisfies this rule's allow condition.
    ///
    /// The role tier short-circuits the IP tier; an invalid or empty
    /// source IP simply means the IP tier never matches.
    pub fn allows(&self, principal: &Principal) -> bool {
        if self.has_allowed_role(principal) {
            return true;
        }

        let source_ip = principal.source_ip.trim();
        if source_ip.is_empty() || !ip::is_valid_ip(source_ip) {
            return false;
        }

        self.groups
            .iter()
            .flat_map(|group| &group.users)
            .any(|entry| entry.ips.iter().any(|allowed| allowed == source_ip))
    }

    fn has_allowed_role(&self, principal: &Principal) -> bool {
        if self.allowed_roles.is_empty() || !principal.logged_in {
            return false;
        }
        principal
            .roles
            .iter()
            .any(|role| self.allowed_roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_with_ip(ip_text: &str) -> Rule {
        Rule::new("/secret")
            .restrict_children(true)
            .group(Group::new("office").user(UserIpEntry::from_text("alice", ip_text)))
    }

    #[test]
    fn test_exact_match_only_without_children() {
        let rule = Rule::new("/secret");
        assert!(rule.matches_path("/secret"));
        assert!(!rule.matches_path("/secret/a"));
        assert!(!rule.matches_path("/secret2"));
    }

    #[test]
    fn test_child_match_on_segment_boundary() {
        let rule = Rule::new("/secret").restrict_children(true);
        assert!(rule.matches_path("/secret"));
        assert!(rule.matches_path("/secret/a"));
        assert!(rule.matches_path("/secret/a/b"));
        // Sibling path sharing the prefix must not match.
        assert!(!rule.matches_path("/secret2"));
        assert!(!rule.matches_path("/secrets"));
    }

    #[test]
    fn test_rule_path_is_normalized_on_construction() {
        let rule = Rule::new("secret/");
        assert_eq!(rule.path, "/secret");
    }

    #[test]
    fn test_role_tier_allows_logged_in_holder() {
        let rule = Rule::new("/admin-area").allow_role("editor");
        let editor = Principal::logged_in(["editor"], "9.9.9.9");
        assert!(rule.allows(&editor));
    }

    #[test]
    fn test_role_tier_requires_login() {
        let rule = Rule::new("/admin-area").allow_role("editor");
        let mut principal = Principal::logged_in(["editor"], "9.9.9.9");
        principal.logged_in = false;
        assert!(!rule.allows(&principal));
    }

    #[test]
    fn test_role_tier_requires_intersection() {
        let rule = Rule::new("/admin-area").allow_role("editor");
        let subscriber = Principal::logged_in(["subscriber"], "9.9.9.9");
        assert!(!rule.allows(&subscriber));
    }

    #[test]
    fn test_ip_tier_exact_match() {
        let rule = rule_with_ip("203.0.113.7\n203.0.113.8");
        assert!(rule.allows(&Principal::anonymous("203.0.113.8")));
        assert!(!rule.allows(&Principal::anonymous("203.0.113.9")));
    }

    #[test]
    fn test_ip_tier_skipped_for_invalid_source() {
        let rule = rule_with_ip("203.0.113.7");
        assert!(!rule.allows(&Principal::anonymous("")));
        assert!(!rule.allows(&Principal::anonymous("not-an-ip")));
    }

    #[test]
    fn test_username_labels_are_never_matched() {
        // The principal "is" bob, but only alice's IP is listed; the IP
        // grants access regardless of whose label it sits under.
        let rule = Rule::new("/secret")
            .group(Group::new("g").user(UserIpEntry::from_text("alice", "203.0.113.7")));
        let bob = Principal::logged_in(["subscriber"], "203.0.113.7");
        assert!(rule.allows(&bob));
    }

    #[test]
    fn test_any_group_any_entry_suffices() {
        let rule = Rule::new("/secret")
            .group(Group::new("first").user(UserIpEntry::from_text("a", "10.0.0.1")))
            .group(
                Group::new("second")
                    .user(UserIpEntry::from_text("b", "10.0.0.2"))
                    .user(UserIpEntry::from_text("c", "10.0.0.3")),
            );
        assert!(rule.allows(&Principal::anonymous("10.0.0.3")));
    }

    #[test]
    fn test_role_branch_short_circuits_ip_branch() {
        // Editor with an unlisted IP is still allowed.
        let rule = Rule::new("/admin-area")
            .allow_role("editor")
            .group(Group::new("g").user(UserIpEntry::from_text("a", "203.0.113.7")));
        let editor = Principal::logged_in(["editor"], "9.9.9.9");
        assert!(rule.allows(&editor));
    }

    #[test]
    fn test_ipv6_source_ip() {
        let rule = rule_with_ip("not-an-ip\n::1");
        assert!(rule.allows(&Principal::anonymous("::1")));
    }
}
