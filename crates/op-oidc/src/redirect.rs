//! Redirect-URI admission control.
//!
//! URL patterns support `*` as a multi-character wildcard in the host
//! and path. A pattern is `[scheme://]host[/path]`: a scheme makes the
//! match scheme-exact, otherwise any scheme is accepted; a missing
//! path (or `/*`) matches any path including none. `*.host` admits any
//! subdomain and the bare apex host. Host matching is case-insensitive,
//! path matching case-sensitive.

use regex::Regex;
use url::Url;

use crate::error::{OidcError, OidcResult};

/// A compiled URL pattern.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    raw: String,
    scheme: Option<String>,
    host: Regex,
    path: Option<Regex>,
}

impl UrlPattern {
    /// Compiles a pattern string.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidRequest` if the pattern is empty or compiles to
    /// an invalid expression.
    pub fn compile(pattern: &str) -> OidcResult<Self> {
        if pattern.is_empty() {
            return Err(OidcError::InvalidRequest("empty URL pattern".to_string()));
        }

        let (scheme, rest) = match pattern.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
            None => (None, pattern),
        };

        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], Some(&rest[idx..])),
            None => (rest, None),
        };

        let host = compile_host(host)?;
        let path = match path {
            // "/*" is the same as no path at all.
            None | Some("/*") => None,
            Some(p) => Some(compile_wildcard(p, false)?),
        };

        Ok(Self {
            raw: pattern.to_string(),
            scheme,
            host,
            path,
        })
    }

    /// The pattern source string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Checks a parsed URL against this pattern.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        if let Some(scheme) = &self.scheme
            && url.scheme() != scheme
        {
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        if !self.host.is_match(host) {
            return false;
        }

        match &self.path {
            None => true,
            Some(path) => path.is_match(url.path()),
        }
    }
}

/// Compiles a host pattern into an anchored case-insensitive regex.
fn compile_host(host: &str) -> OidcResult<Regex> {
    let body = if host == "*" {
        ".*".to_string()
    } else if let Some(apex) = host.strip_prefix("*.") {
        // Any subdomain, and the apex host itself.
        format!("([a-z0-9.\\-]*\\.)?{}", regex::escape(apex))
    } else {
        wildcard_body(host)
    };

    Regex::new(&format!("(?i)^{body}$"))
        .map_err(|e| OidcError::InvalidRequest(format!("bad host pattern '{host}': {e}")))
}

/// Compiles a wildcarded literal into an anchored regex.
fn compile_wildcard(literal: &str, case_insensitive: bool) -> OidcResult<Regex> {
    let flag = if case_insensitive { "(?i)" } else { "" };
    Regex::new(&format!("{flag}^{}$", wildcard_body(literal)))
        .map_err(|e| OidcError::InvalidRequest(format!("bad pattern '{literal}': {e}")))
}

/// Escapes literal segments and turns each `*` into a greedy wildcard.
fn wildcard_body(literal: &str) -> String {
    literal
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}

/// A compiled pattern list (whitelist or blacklist).
#[derive(Debug, Clone, Default)]
pub struct UrlPatternList {
    patterns: Vec<UrlPattern>,
}

impl UrlPatternList {
    /// Compiles a list of pattern strings.
    ///
    /// ## Errors
    ///
    /// Returns an error if any pattern fails to compile.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> OidcResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| UrlPattern::compile(p.as_ref()))
            .collect::<OidcResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Checks whether any compiled pattern matches the URL.
    ///
    /// Input that does not parse as an absolute URL (no scheme, no
    /// host) never matches.
    #[must_use]
    pub fn is_listed(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        self.patterns.iter().any(|p| p.matches(&url))
    }

    /// Returns true if the list holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Composed admission rule over a whitelist and a blacklist.
///
/// A blacklisted URL is always rejected regardless of whitelist
/// membership; otherwise the URL is admitted when no whitelist is
/// configured or the whitelist matches.
#[derive(Debug, Clone, Default)]
pub struct RedirectUriPolicy {
    whitelist: Option<UrlPatternList>,
    blacklist: Option<UrlPatternList>,
}

impl RedirectUriPolicy {
    /// Sets the whitelist.
    #[must_use]
    pub fn with_whitelist(mut self, whitelist: UrlPatternList) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    /// Sets the blacklist.
    #[must_use]
    pub fn with_blacklist(mut self, blacklist: UrlPatternList) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    /// Checks whether a URL is admitted.
    #[must_use]
    pub fn admits(&self, url: &str) -> bool {
        if let Some(blacklist) = &self.blacklist
            && blacklist.is_listed(url)
        {
            return false;
        }
        match &self.whitelist {
            None => true,
            Some(whitelist) => whitelist.is_listed(url),
        }
    }
}
