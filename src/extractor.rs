//! Principal extraction from HTTP requests.
//!
//! The gate needs two facts about the requester besides the peer address:
//! whether they are logged in, and which role slugs they hold. The
//! [`PrincipalExtractor`] trait is the seam where the host's authentication
//! plugs in — headers set by an auth proxy, request extensions set by an
//! upstream middleware, or anything custom.
//!
//! The source IP is not part of extraction; the middleware takes it from
//! the transport-layer peer address.

use http::Request;
use std::collections::HashSet;
use std::sync::Arc;

/// Login state and role slugs extracted from one request.
#[derive(Debug, Clone, Default)]
pub struct PrincipalParts {
    /// Whether the requester is an authenticated user.
    pub logged_in: bool,
    /// Role slugs held by the requester.
    pub roles: HashSet<String>,
}

impl PrincipalParts {
    /// Parts for a logged-in user with the given roles.
    pub fn logged_in(roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            logged_in: true,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Parts for an anonymous requester.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Result of principal extraction.
#[derive(Debug, Clone)]
pub enum PrincipalExtraction {
    /// The requester was identified.
    Identified(PrincipalParts),
    /// No identity could be extracted (anonymous visitor).
    Anonymous,
    /// An error occurred during extraction.
    Error(String),
}

impl PrincipalExtraction {
    /// Get the extracted parts, degrading to anonymous on failure.
    pub fn parts_or_anonymous(self) -> PrincipalParts {
        match self {
            Self::Identified(parts) => parts,
            Self::Anonymous | Self::Error(_) => PrincipalParts::anonymous(),
        }
    }
}

/// Trait for extracting the requester's identity from HTTP requests.
///
/// The trait is synchronous because extraction typically reads headers or
/// request extensions, which doesn't require async.
///
/// # Example
/// ```
/// use axum_dirgate::{PrincipalExtractor, PrincipalExtraction, PrincipalParts};
/// use http::Request;
///
/// /// Treat any bearer token as an editor session.
/// struct TokenExtractor;
///
/// impl<B> PrincipalExtractor<B> for TokenExtractor {
///     fn extract(&self, request: &Request<B>) -> PrincipalExtraction {
///         match request.headers().get("Authorization") {
///             Some(_) => PrincipalExtraction::Identified(PrincipalParts::logged_in(["editor"])),
///             None => PrincipalExtraction::Anonymous,
///         }
///     }
/// }
/// ```
pub trait PrincipalExtractor<B>: Send + Sync {
    /// Extract the requester's login state and roles.
    fn extract(&self, request: &Request<B>) -> PrincipalExtraction;
}

impl<B, T: PrincipalExtractor<B>> PrincipalExtractor<B> for Arc<T> {
    fn extract(&self, request: &Request<B>) -> PrincipalExtraction {
        (**self).extract(request)
    }
}

impl<B, T: PrincipalExtractor<B> + ?Sized> PrincipalExtractor<B> for Box<T> {
    fn extract(&self, request: &Request<B>) -> PrincipalExtraction {
        (**self).extract(request)
    }
}

/// Extract role slugs from an HTTP header.
///
/// The header value is a comma-separated list of role slugs (e.g.
/// `editor, author`). A present, non-empty header means the requester is
/// logged in; a missing or empty header means anonymous. An auth proxy in
/// front of the application would typically set this header.
///
/// # Example
/// ```
/// use axum_dirgate::HeaderPrincipalExtractor;
///
/// let extractor = HeaderPrincipalExtractor::new("X-User-Roles");
/// ```
#[derive(Debug, Clone)]
pub struct HeaderPrincipalExtractor {
    header_name: String,
}

impl HeaderPrincipalExtractor {
    /// Create a new header principal extractor.
    pub fn new(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
        }
    }
}

impl<B> PrincipalExtractor<B> for HeaderPrincipalExtractor {
    fn extract(&self, request: &Request<B>) -> PrincipalExtraction {
        match request.headers().get(&self.header_name) {
            Some(value) => match value.to_str() {
                Ok(s) => {
                    let roles: HashSet<String> = s
                        .split(',')
                        .map(str::trim)
                        .filter(|slug| !slug.is_empty())
                        .map(str::to_string)
                        .collect();
                    if roles.is_empty() {
                        PrincipalExtraction::Anonymous
                    } else {
                        PrincipalExtraction::Identified(PrincipalParts {
                            logged_in: true,
                            roles,
                        })
                    }
                }
                Err(_) => PrincipalExtraction::Error(format!(
                    "header {} is not valid UTF-8",
                    self.header_name
                )),
            },
            None => PrincipalExtraction::Anonymous,
        }
    }
}

/// Extract the principal from a request extension.
///
/// Looks for identity that a previous middleware (e.g. session
/// authentication) stored as a request extension.
///
/// # Example
/// ```
/// use axum_dirgate::{ExtensionPrincipalExtractor, PrincipalParts};
///
/// #[derive(Clone)]
/// struct Session {
///     roles: Vec<String>,
/// }
///
/// let extractor = ExtensionPrincipalExtractor::<Session>::new(|session| {
///     PrincipalParts::logged_in(session.roles.iter().cloned())
/// });
/// ```
pub struct ExtensionPrincipalExtractor<T> {
    extract_fn: Box<dyn Fn(&T) -> PrincipalParts + Send + Sync>,
}

impl<T> ExtensionPrincipalExtractor<T> {
    /// Create a new extension principal extractor.
    ///
    /// The `extract_fn` converts the extension type to principal parts.
    pub fn new<F>(extract_fn: F) -> Self
    where
        F: Fn(&T) -> PrincipalParts + Send + Sync + 'static,
    {
        Self {
            extract_fn: Box::new(extract_fn),
        }
    }
}

impl<T> std::fmt::Debug for ExtensionPrincipalExtractor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionPrincipalExtractor")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<B, T: Clone + Send + Sync + 'static> PrincipalExtractor<B> for ExtensionPrincipalExtractor<T> {
    fn extract(&self, request: &Request<B>) -> PrincipalExtraction {
        match request.extensions().get::<T>() {
            Some(ext) => PrincipalExtraction::Identified((self.extract_fn)(ext)),
            None => PrincipalExtraction::Anonymous,
        }
    }
}

/// An extractor that always returns a fixed principal.
///
/// Useful for testing.
#[derive(Debug, Clone)]
pub struct FixedPrincipalExtractor {
    parts: PrincipalParts,
}

impl FixedPrincipalExtractor {
    /// Create a new fixed principal extractor.
    pub fn new(parts: PrincipalParts) -> Self {
        Self { parts }
    }
}

impl<B> PrincipalExtractor<B> for FixedPrincipalExtractor {
    fn extract(&self, _request: &Request<B>) -> PrincipalExtraction {
        PrincipalExtraction::Identified(self.parts.clone())
    }
}

/// An extractor that always returns anonymous.
#[derive(Debug, Clone, Default)]
pub struct AnonymousPrincipalExtractor;

impl AnonymousPrincipalExtractor {
    /// Create a new anonymous principal extractor.
    pub fn new() -> Self {
        Self
    }
}

impl<B> PrincipalExtractor<B> for AnonymousPrincipalExtractor {
    fn extract(&self, _request: &Request<B>) -> PrincipalExtraction {
        PrincipalExtraction::Anonymous
    }
}

/// A composite extractor that tries multiple extractors in order.
///
/// Returns the first identified principal, or anonymous if none identify
/// the requester. Results are NOT merged across extractors.
pub struct ChainedPrincipalExtractor<B> {
    extractors: Vec<Box<dyn PrincipalExtractor<B>>>,
}

impl<B> ChainedPrincipalExtractor<B> {
    /// Create a new chained principal extractor.
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Add an extractor to the chain.
    pub fn add<E: PrincipalExtractor<B> + 'static>(mut self, extractor: E) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }
}

impl<B> Default for ChainedPrincipalExtractor<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> std::fmt::Debug for ChainedPrincipalExtractor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedPrincipalExtractor")
            .field("extractors_count", &self.extractors.len())
            .finish()
    }
}

impl<B> PrincipalExtractor<B> for ChainedPrincipalExtractor<B>
where
    B: Send + Sync,
{
    fn extract(&self, request: &Request<B>) -> PrincipalExtraction {
        for extractor in &self.extractors {
            match extractor.extract(request) {
                PrincipalExtraction::Identified(parts) => {
                    return PrincipalExtraction::Identified(parts)
                }
                PrincipalExtraction::Error(e) => {
                    tracing::warn!(error = %e, "principal extractor failed, trying next");
                }
                PrincipalExtraction::Anonymous => continue,
            }
        }
        PrincipalExtraction::Anonymous
    }
}
