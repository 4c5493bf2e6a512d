//! # axum-dirgate
//!
//! Protected-directory access gate middleware for [axum](https://docs.rs/axum) 0.8.
//!
//! Each incoming request's path is checked against an ordered list of
//! protected-directory rules. When a rule governs the path, the request is
//! allowed only if the requester satisfies the rule's allow condition:
//!
//! - **Role tier**: a logged-in user holding any of the rule's allowed
//!   roles is allowed unconditionally.
//! - **IP tier**: otherwise, the transport-layer peer IP is compared
//!   against the rule's allow-list groups; any exact IPv4/IPv6 match
//!   allows. No CIDR ranges — exact literals only.
//!
//! Everything else is a 403 with cache-disabled headers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use axum_dirgate::{DirGateLayer, RuleSet, Rule, Group, UserIpEntry};
//! use std::net::SocketAddr;
//!
//! async fn reports() -> &'static str {
//!     "quarterly reports"
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let rules = RuleSet::builder()
//!         .rule(Rule::new("/members")
//!             .restrict_children(true)
//!             .allow_role("editor")
//!             .group(Group::new("office")
//!                 .user(UserIpEntry::from_text("alice", "203.0.113.7"))))
//!         .build();
//!
//!     let app = Router::new()
//!         .route("/members/reports", get(reports))
//!         .layer(DirGateLayer::new(rules).with_bypass_role("administrator"));
//!
//!     // into_make_service_with_connect_info is required so the gate can
//!     // see the peer address for IP allow-lists.
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     ).await.unwrap();
//! }
//! ```
//!
//! ## Rule Evaluation
//!
//! Rules are scanned in stored order; the **first** rule whose path governs
//! the request decides, and its verdict is final — a deny is never rescued
//! by a later, more permissive rule. Matching semantics:
//!
//! - Paths are normalized before comparison (leading `/`, no trailing `/`);
//!   the query string is ignored.
//! - Without `restrict_children`, only the exact path matches. With it,
//!   nested paths match on a full segment boundary: a rule for `/secret`
//!   governs `/secret/a` but never `/secret2`.
//! - Inactive rules and rules with an empty path are skipped.
//!
//! The gate **fails open**: requests with no governing rule, an empty rule
//! set, or an empty request path are allowed. If you need default-deny,
//! add a catch-all handler behind the gate instead.
//!
//! ## Principal Extraction
//!
//! By default the requester's roles come from the `X-User-Roles` header
//! (comma-separated slugs set by an auth proxy; a present header means
//! logged in). Implement [`PrincipalExtractor`] or use
//! [`ExtensionPrincipalExtractor`] to integrate session middleware:
//!
//! ```
//! use axum_dirgate::{DirGateLayer, RuleSet, ExtensionPrincipalExtractor, PrincipalParts};
//!
//! #[derive(Clone)]
//! struct Session { roles: Vec<String> }
//!
//! let layer = DirGateLayer::new(RuleSet::new())
//!     .with_principal_extractor(ExtensionPrincipalExtractor::<Session>::new(|s| {
//!         PrincipalParts::logged_in(s.roles.iter().cloned())
//!     }));
//! ```
//!
//! ## IP Allow-Lists
//!
//! Allow-list entries carry a username label and a free-text IP block
//! (tab/newline separated). Labels are bookkeeping only — any listed IP
//! under a rule's groups grants access, regardless of whose label it sits
//! under. Invalid literals in the text are silently dropped; see
//! [`ip::parse_ip_block`]. The peer address is taken from `ConnectInfo`
//! only; `X-Forwarded-For` is deliberately not consulted.
//!
//! ## TOML Configuration
//!
//! ```
//! use axum_dirgate::RuleSet;
//!
//! const CONFIG: &str = r#"
//! [[rules]]
//! path = "/members"
//! restrict_children = true
//! allowed_roles = ["editor"]
//!
//! [[rules.groups]]
//! name = "office"
//!
//! [[rules.groups.users]]
//! username = "alice"
//! ips = "203.0.113.7"
//! "#;
//!
//! let rules = RuleSet::from_toml(CONFIG).unwrap();
//! ```
//!
//! ## Custom Denied Response
//!
//! ```
//! use axum_dirgate::{DirGateLayer, RuleSet, JsonDeniedHandler};
//!
//! let layer = DirGateLayer::new(RuleSet::new())
//!     .with_denied_handler(JsonDeniedHandler::new());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod extractor;
mod gate;
mod middleware;

pub mod ip;
pub mod path;
mod rule;

// Re-export main types
pub use config::{ConfigError, FileRuleProvider, GateSettings, GroupConfig, RuleConfig, UserIpConfig};
pub use error::{
    AccessDenied, DefaultDeniedHandler, DeniedHandler, DirGateError, JsonDeniedHandler,
};
pub use extractor::{
    AnonymousPrincipalExtractor, ChainedPrincipalExtractor, ExtensionPrincipalExtractor,
    FixedPrincipalExtractor, HeaderPrincipalExtractor, PrincipalExtraction, PrincipalExtractor,
    PrincipalParts,
};
pub use gate::{Decision, RuleProvider, RuleSet, RuleSetBuilder, StaticRuleProvider};
pub use middleware::{DirGateLayer, DirGateMiddleware, ErasedRuleProvider, GateConfig, RuleSource};
pub use rule::{Group, Principal, Rule, UserIpEntry};

/// Prelude module for convenient imports.
///
/// ```
/// use axum_dirgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigError, GateSettings};
    pub use crate::error::{AccessDenied, DeniedHandler, DirGateError};
    pub use crate::extractor::{PrincipalExtraction, PrincipalExtractor, PrincipalParts};
    pub use crate::gate::{Decision, RuleProvider, RuleSet};
    pub use crate::middleware::DirGateLayer;
    pub use crate::rule::{Group, Principal, Rule, UserIpEntry};
}
