//! Gate middleware for axum.
//!
//! [`DirGateLayer`] wires the access gate into the request pipeline as a
//! tower layer: per request it assembles a [`Principal`] (extractor roles
//! plus the transport-layer peer IP), checks the bypass roles, runs the
//! rule scan, and either passes the request through or terminates it with
//! the configured 403 handler.
//!
//! Rules come either from a fixed snapshot or from a [`RuleProvider`]
//! consulted per request; a provider failure degrades to an empty rule set
//! (default-allow) instead of failing the request.
//!
//! The peer IP comes from `ConnectInfo` only; forwarded headers such as
//! `X-Forwarded-For` are never consulted. A missing peer address leaves the
//! source IP empty, which disables the IP allow-list tier for that request
//! without failing it.

use crate::error::{AccessDenied, DefaultDeniedHandler, DeniedHandler, DirGateError};
use crate::extractor::{HeaderPrincipalExtractor, PrincipalExtractor};
use crate::gate::{RuleProvider, RuleSet};
use crate::path;
use crate::rule::Principal;

use axum::extract::ConnectInfo;
use axum::response::Response;
use futures_util::future::BoxFuture;
use http::Request;
use http_body::Body;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Object-safe adapter over [`RuleProvider`], used by [`RuleSource`] to
/// erase the provider's error type.
pub trait ErasedRuleProvider: Send + Sync {
    /// Load the current rule set snapshot.
    fn load(&self) -> Result<RuleSet, DirGateError>;
}

impl<T: RuleProvider> ErasedRuleProvider for T {
    fn load(&self) -> Result<RuleSet, DirGateError> {
        self.load_rules()
            .map_err(|err| DirGateError::Provider(err.to_string()))
    }
}

/// Where the middleware gets its rule set for each request.
#[derive(Clone)]
pub enum RuleSource {
    /// A fixed snapshot shared across all requests.
    Fixed(Arc<RuleSet>),
    /// A provider consulted on every request. A load failure is logged and
    /// treated as an empty rule set (default-allow), never a failed
    /// request.
    Provider(Arc<dyn ErasedRuleProvider>),
}

impl RuleSource {
    /// Resolve the rule set snapshot for one request.
    fn snapshot(&self) -> Arc<RuleSet> {
        match self {
            Self::Fixed(rules) => Arc::clone(rules),
            Self::Provider(provider) => match provider.load() {
                Ok(loaded) => Arc::new(loaded),
                Err(err) => {
                    tracing::error!(error = %err, "rule provider failed; treating settings as empty");
                    Arc::new(RuleSet::new())
                }
            },
        }
    }
}

/// Shared configuration for the gate middleware.
pub struct GateConfig<P> {
    /// Where the per-request rule set snapshot comes from.
    pub rules: RuleSource,
    /// The principal extractor.
    pub principal_extractor: Arc<P>,
    /// The handler producing the 403 response.
    pub denied_handler: Arc<dyn DeniedHandler>,
    /// Principals holding any of these roles skip the rule scan entirely
    /// (the administrative exemption).
    pub bypass_roles: Arc<HashSet<String>>,
}

// Manual Clone impl to avoid requiring P: Clone (it sits behind an Arc).
impl<P> Clone for GateConfig<P> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            principal_extractor: self.principal_extractor.clone(),
            denied_handler: self.denied_handler.clone(),
            bypass_roles: self.bypass_roles.clone(),
        }
    }
}

/// A tower layer that adds the directory gate to a service.
///
/// # Example
/// ```no_run
/// use axum::{Router, routing::get};
/// use axum_dirgate::{DirGateLayer, RuleSet, Rule};
/// use std::net::SocketAddr;
///
/// async fn handler() -> &'static str {
///     "members area"
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let rules = RuleSet::builder()
///         .rule(Rule::new("/members").restrict_children(true).allow_role("editor"))
///         .build();
///
///     let app = Router::new()
///         .route("/members/reports", get(handler))
///         .layer(DirGateLayer::new(rules).with_bypass_role("administrator"));
///
///     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
///     // into_make_service_with_connect_info is required for peer-IP checks.
///     axum::serve(
///         listener,
///         app.into_make_service_with_connect_info::<SocketAddr>(),
///     )
///     .await
///     .unwrap();
/// }
/// ```
#[derive(Clone)]
pub struct DirGateLayer<P> {
    config: GateConfig<P>,
}

impl DirGateLayer<HeaderPrincipalExtractor> {
    /// Create a new gate layer with a fixed rule set snapshot.
    ///
    /// Uses the default header principal extractor (`X-User-Roles`,
    /// comma-separated slugs) and the default plain-text 403 handler.
    pub fn new(rules: RuleSet) -> Self {
        Self::with_rule_source(RuleSource::Fixed(Arc::new(rules)))
    }

    /// Create a new gate layer that loads its rules from a provider on
    /// every request.
    ///
    /// Snapshot semantics: each request observes whatever whole rule set
    /// the provider returns. A load failure is logged and degrades to an
    /// empty rule set, so a broken settings store fails open rather than
    /// taking the site down.
    ///
    /// # Example
    /// ```no_run
    /// use axum_dirgate::{DirGateLayer, FileRuleProvider};
    ///
    /// let layer = DirGateLayer::from_provider(FileRuleProvider::new("config/gate.toml"));
    /// ```
    pub fn from_provider(provider: impl RuleProvider + 'static) -> Self {
        Self::with_rule_source(RuleSource::Provider(Arc::new(provider)))
    }

    fn with_rule_source(rules: RuleSource) -> Self {
        Self {
            config: GateConfig {
                rules,
                principal_extractor: Arc::new(HeaderPrincipalExtractor::new("X-User-Roles")),
                denied_handler: Arc::new(DefaultDeniedHandler),
                bypass_roles: Arc::new(HashSet::new()),
            },
        }
    }
}

impl<P> DirGateLayer<P> {
    /// Replace the principal extractor.
    pub fn with_principal_extractor<P2>(self, extractor: P2) -> DirGateLayer<P2> {
        DirGateLayer {
            config: GateConfig {
                rules: self.config.rules,
                principal_extractor: Arc::new(extractor),
                denied_handler: self.config.denied_handler,
                bypass_roles: self.config.bypass_roles,
            },
        }
    }

    /// Set a custom denied handler.
    pub fn with_denied_handler(mut self, handler: impl DeniedHandler + 'static) -> Self {
        self.config.denied_handler = Arc::new(handler);
        self
    }

    /// Add a role whose holders skip the rule scan entirely.
    pub fn with_bypass_role(self, role: impl Into<String>) -> Self {
        let mut roles = (*self.config.bypass_roles).clone();
        roles.insert(role.into());
        self.with_bypass_roles(roles)
    }

    /// Replace the set of bypass roles.
    pub fn with_bypass_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.bypass_roles = Arc::new(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Get a reference to the rule set when the layer holds a fixed
    /// snapshot. Provider-backed layers have no resident rule set and
    /// return `None`.
    pub fn rules(&self) -> Option<&RuleSet> {
        match &self.config.rules {
            RuleSource::Fixed(rules) => Some(rules),
            RuleSource::Provider(_) => None,
        }
    }
}

impl<S, P> Layer<S> for DirGateLayer<P> {
    type Service = DirGateMiddleware<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        DirGateMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

/// The gate middleware service.
#[derive(Clone)]
pub struct DirGateMiddleware<S, P> {
    inner: S,
    config: GateConfig<P>,
}

impl<S, P, ReqBody> Service<Request<ReqBody>> for DirGateMiddleware<S, P>
where
    S: Service<Request<ReqBody>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    P: PrincipalExtractor<ReqBody> + 'static,
    ReqBody: Body + Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        // Everything the gate needs is available synchronously, before the
        // request body is touched.
        let rules = config.rules.snapshot();

        let parts = config
            .principal_extractor
            .extract(&request)
            .parts_or_anonymous();

        let source_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_default();
        if source_ip.is_empty() {
            tracing::debug!("no peer address on request; IP allow-lists will not match");
        }

        let raw_uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());

        let bypass = !config.bypass_roles.is_empty()
            && parts.logged_in
            && parts.roles.iter().any(|r| config.bypass_roles.contains(r));

        let principal = Principal {
            logged_in: parts.logged_in,
            roles: parts.roles,
            source_ip,
        };

        Box::pin(async move {
            let decision = rules.evaluate(&raw_uri, &principal, bypass);

            if decision.is_allow() {
                tracing::trace!(
                    uri = %raw_uri,
                    logged_in = principal.logged_in,
                    ip = %principal.source_ip,
                    "gate allowed request"
                );
                return inner.call(request).await;
            }

            tracing::info!(
                uri = %raw_uri,
                logged_in = principal.logged_in,
                ip = %principal.source_ip,
                "gate denied request"
            );

            let mut roles: Vec<String> = principal.roles.into_iter().collect();
            roles.sort();
            let denied = AccessDenied::new(path::request_path(&raw_uri), roles);
            Ok(config.denied_handler.handle(&denied))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JsonDeniedHandler;
    use crate::extractor::{FixedPrincipalExtractor, PrincipalParts};
    use crate::gate::StaticRuleProvider;
    use crate::rule::{Group, Rule, UserIpEntry};
    use axum::body::Body as AxumBody;
    use http::StatusCode;
    use std::convert::Infallible;
    use tower::ServiceExt;

    async fn ok_handler(_req: Request<AxumBody>) -> Result<Response, Infallible> {
        Ok(Response::new(AxumBody::from("ok")))
    }

    fn member_rules() -> RuleSet {
        RuleSet::builder()
            .rule(
                Rule::new("/members")
                    .restrict_children(true)
                    .allow_role("editor")
                    .group(Group::new("office").user(UserIpEntry::from_text("alice", "203.0.113.7"))),
            )
            .build()
    }

    fn request(uri: &str, peer: Option<&str>) -> Request<AxumBody> {
        let mut req = Request::builder().uri(uri).body(AxumBody::empty()).unwrap();
        if let Some(addr) = peer {
            let addr: SocketAddr = addr.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_allowed_role_passes_through() {
        let layer = DirGateLayer::new(member_rules()).with_principal_extractor(
            FixedPrincipalExtractor::new(PrincipalParts::logged_in(["editor"])),
        );
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("9.9.9.9:4242")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_role_gets_403() {
        let layer = DirGateLayer::new(member_rules()).with_principal_extractor(
            FixedPrincipalExtractor::new(PrincipalParts::logged_in(["subscriber"])),
        );
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("9.9.9.9:4242")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(http::header::CACHE_CONTROL).is_some());
    }

    #[tokio::test]
    async fn test_denied_response_carries_forbidden_message() {
        // The handler's human-readable body must reach the client intact.
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("9.9.9.9:1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_bytes(response).await, b"Access forbidden");
    }

    #[tokio::test]
    async fn test_json_denied_body_reaches_client() {
        let layer = DirGateLayer::new(member_rules())
            .with_denied_handler(JsonDeniedHandler::new());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("9.9.9.9:1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let value: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["error"], "access_denied");
        assert_eq!(value["message"], "Access forbidden");
    }

    #[tokio::test]
    async fn test_allowed_response_body_is_untouched() {
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc.oneshot(request("/public", None)).await.unwrap();
        assert_eq!(body_bytes(response).await, b"ok");
    }

    #[tokio::test]
    async fn test_listed_peer_ip_allows_anonymous() {
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("203.0.113.7:55555")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_peer_address_fails_closed_on_ip_tier() {
        // No ConnectInfo: the IP tier never matches, but the request is
        // still evaluated (and denied here) rather than erroring.
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc.oneshot(request("/members/reports", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unprotected_path_passes_through() {
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc.oneshot(request("/public", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bypass_role_skips_rules() {
        let layer = DirGateLayer::new(member_rules())
            .with_principal_extractor(FixedPrincipalExtractor::new(PrincipalParts::logged_in(
                ["administrator"],
            )))
            .with_bypass_role("administrator");
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("9.9.9.9:1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_string_does_not_defeat_matching() {
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports?page=2", Some("9.9.9.9:1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_header_extractor_default_wiring() {
        let layer = DirGateLayer::new(member_rules());
        let svc = layer.layer(tower::service_fn(ok_handler));
        let mut req = request("/members/reports", Some("9.9.9.9:1"));
        req.headers_mut()
            .insert("X-User-Roles", "editor".parse().unwrap());
        let response = svc.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_provider_backed_rules_are_enforced() {
        let layer = DirGateLayer::from_provider(StaticRuleProvider::new(member_rules()))
            .with_principal_extractor(FixedPrincipalExtractor::new(PrincipalParts::logged_in(
                ["subscriber"],
            )));
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc
            .oneshot(request("/members/reports", Some("9.9.9.9:1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(layer.rules().is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_empty_rules() {
        struct FailingProvider;

        impl RuleProvider for FailingProvider {
            type Error = std::io::Error;

            fn load_rules(&self) -> Result<RuleSet, Self::Error> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "settings store unavailable",
                ))
            }
        }

        // A broken settings store means no rules, which fails open.
        let layer = DirGateLayer::from_provider(FailingProvider);
        let svc = layer.layer(tower::service_fn(ok_handler));
        let response = svc.oneshot(request("/members/reports", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
