//! Canonical component identity.
//!
//! Every addressable entity in a yadtshell registry — host, service,
//! artefact, or sentinel — carries a [`Uri`] of the strict form
//! `type://host[/name[/version]]`. This crate only deals in that string
//! grammar and its typed representation; it knows nothing about registries
//! or components.

#![warn(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three component kinds addressable by a [`Uri`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// A remote host.
    Host,
    /// A service running on a host.
    Service,
    /// A named, versioned artefact installed on a host.
    Artefact,
}

impl ComponentKind {
    /// The URI scheme for this kind (`"host"`, `"service"`, `"artefact"`).
    pub fn scheme(self) -> &'static str {
        match self {
            ComponentKind::Host => "host",
            ComponentKind::Service => "service",
            ComponentKind::Artefact => "artefact",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for ComponentKind {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(ComponentKind::Host),
            "service" => Ok(ComponentKind::Service),
            "artefact" => Ok(ComponentKind::Artefact),
            other => Err(UriError::UnknownScheme(other.to_string())),
        }
    }
}

/// The two revision aliases an artefact URI's version slot may carry.
///
/// Two URIs differing only in revision alias (or a numeric version vs.
/// an alias) denote the same artefact entity, indexed twice in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revision {
    /// The version currently installed.
    Current,
    /// The version targeted by the next update.
    Next,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Current => f.write_str("current"),
            Revision::Next => f.write_str("next"),
        }
    }
}

impl FromStr for Revision {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(Revision::Current),
            "next" => Ok(Revision::Next),
            _ => Err(()),
        }
    }
}

/// Errors raised while parsing a URI string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    /// The string was empty.
    #[error("empty URI")]
    Empty,
    /// No `://` separator was found, or the scheme was unrecognized.
    #[error("unknown or missing URI scheme: {0}")]
    UnknownScheme(String),
    /// The `host` segment was missing.
    #[error("URI is missing a host segment: {0}")]
    MissingHost(String),
}

/// Structured component identity: `type://host[/name[/version]]`.
///
/// `host` is always the short hostname (first label); the FQDN is carried
/// separately on [`Host`](https://docs.rs/yadt-registry)'s own fields, not
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Uri {
    // Ord/PartialOrd (below) are derived from the canonical string, not
    // from field order, so URIs sort the way a human reading them would.
    kind: ComponentKind,
    host: String,
    name: Option<String>,
    version: Option<String>,
}

impl Uri {
    /// Construct a URI directly from its parts.
    pub fn new(
        kind: ComponentKind,
        host: impl Into<String>,
        name: Option<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            kind,
            host: short_host(&host.into()).to_string(),
            name,
            version,
        }
    }

    /// Build the canonical string for a component identity.
    ///
    /// This is the constructor named in spec.md: `create(type, host, name?,
    /// version?) -> s`.
    pub fn create(
        kind: ComponentKind,
        host: impl Into<String>,
        name: Option<&str>,
        version: Option<&str>,
    ) -> String {
        Self::new(
            kind,
            host,
            name.map(str::to_string),
            version.map(str::to_string),
        )
        .to_string()
    }

    /// Parse the strict `type://host[/name[/version]]` grammar.
    pub fn parse(s: &str) -> Result<Self, UriError> {
        if s.is_empty() {
            return Err(UriError::Empty);
        }
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| UriError::UnknownScheme(s.to_string()))?;
        let kind = ComponentKind::from_str(scheme)?;

        if rest.is_empty() {
            return Err(UriError::MissingHost(s.to_string()));
        }
        let mut parts = rest.splitn(3, '/');
        let host = parts.next().filter(|h| !h.is_empty());
        let host = host.ok_or_else(|| UriError::MissingHost(s.to_string()))?;
        let name = parts.next().map(str::to_string);
        let version = parts.next().map(str::to_string);

        Ok(Self::new(kind, host.to_string(), name, version))
    }

    /// This URI's component kind.
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// The short hostname this URI addresses (or, for a `host://` URI, is).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The `name` segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The `version` segment, if any (numeric string or revision alias).
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The `host://<host>` URI that owns this component.
    pub fn host_uri(&self) -> Uri {
        Uri::new(ComponentKind::Host, self.host.clone(), None, None)
    }

    /// Rewrite this URI's version slot to the given revision alias,
    /// returning a new URI. Used to collapse or re-expand the `current`
    /// / `next` aliases of an artefact URI.
    pub fn change_version(&self, revision: Revision) -> Uri {
        Uri {
            kind: self.kind,
            host: self.host.clone(),
            name: self.name.clone(),
            version: Some(revision.to_string()),
        }
    }

    /// True if this URI's version segment is a revision alias rather than
    /// a concrete numeric version.
    pub fn is_revision_alias(&self) -> bool {
        matches!(self.version.as_deref(), Some("current") | Some("next"))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.host)?;
        if let Some(name) = &self.name {
            write!(f, "/{name}")?;
            if let Some(version) = &self.version {
                write!(f, "/{version}")?;
            }
        }
        Ok(())
    }
}

impl PartialOrd for Uri {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uri {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = UriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Uri::parse(&value)
    }
}

impl From<Uri> for String {
    fn from(value: Uri) -> Self {
        value.to_string()
    }
}

/// Reduce a hostname (possibly an FQDN) to its first label.
///
/// Used both when building URIs and when comparing a decoded `hostname`
/// field against a host's FQDN.
pub fn short_host(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_uri() {
        let uri = Uri::parse("host://web01").unwrap();
        assert_eq!(uri.kind(), ComponentKind::Host);
        assert_eq!(uri.host(), "web01");
        assert_eq!(uri.name(), None);
        assert_eq!(uri.to_string(), "host://web01");
    }

    #[test]
    fn parses_service_uri() {
        let uri = Uri::parse("service://web01/nginx").unwrap();
        assert_eq!(uri.kind(), ComponentKind::Service);
        assert_eq!(uri.name(), Some("nginx"));
        assert_eq!(uri.to_string(), "service://web01/nginx");
    }

    #[test]
    fn parses_artefact_uri_with_version() {
        let uri = Uri::parse("artefact://web01/myapp/42").unwrap();
        assert_eq!(uri.name(), Some("myapp"));
        assert_eq!(uri.version(), Some("42"));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert_eq!(
            Uri::parse("container://web01/x"),
            Err(UriError::UnknownScheme("container".to_string()))
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Uri::parse(""), Err(UriError::Empty));
    }

    #[test]
    fn create_matches_parse_round_trip() {
        let s = Uri::create(ComponentKind::Artefact, "web01", Some("myapp"), Some("next"));
        assert_eq!(s, "artefact://web01/myapp/next");
        let parsed = Uri::parse(&s).unwrap();
        assert_eq!(parsed.to_string(), s);
    }

    #[test]
    fn change_version_rewrites_alias() {
        let uri = Uri::parse("artefact://web01/myapp/13").unwrap();
        let next = uri.change_version(Revision::Next);
        assert_eq!(next.to_string(), "artefact://web01/myapp/next");
        assert!(next.is_revision_alias());
        assert!(!uri.is_revision_alias());
    }

    #[test]
    fn host_uri_derivation() {
        let uri = Uri::parse("service://web01/nginx").unwrap();
        assert_eq!(uri.host_uri().to_string(), "host://web01");
    }

    #[test]
    fn host_segment_is_shortened() {
        let uri = Uri::new(ComponentKind::Host, "web01.example.com", None, None);
        assert_eq!(uri.host(), "web01");
    }

    #[test]
    fn two_aliases_share_host_and_name() {
        let current = Uri::parse("artefact://web01/myapp/current").unwrap();
        let next = current.change_version(Revision::Next);
        assert_eq!(current.host(), next.host());
        assert_eq!(current.name(), next.name());
        assert_ne!(current, next);
    }
}
