//! Request URL composition.

use url::{Host, Url};

use crate::config::ElasticsearchConfig;
use crate::error::{ElasticsearchError, Result};

/// Composes absolute request URLs from a validated connection configuration.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: Url,
}

impl UrlBuilder {
    /// Create a builder for a configuration.
    ///
    /// The configuration is validated first; a host that cannot be placed in a
    /// URL is reported as [`MalformedUrl`](ElasticsearchError::MalformedUrl).
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        config.validate()?;

        let malformed =
            || ElasticsearchError::MalformedUrl(format!("invalid host: {}", config.host));

        let mut base = Url::parse(&format!("{}://{}", config.scheme, config.host))
            .map_err(|e| ElasticsearchError::MalformedUrl(format!("{}: {e}", config.host)))?;

        // The host must parse back as exactly the host, with nothing spilling
        // into userinfo, port, path, query or fragment.
        if !same_host(base.host(), &config.host)
            || !base.username().is_empty()
            || base.password().is_some()
            || base.port().is_some()
            || base.path() != "/"
            || base.query().is_some()
            || base.fragment().is_some()
        {
            return Err(malformed());
        }

        base.set_port(config.port).map_err(|()| malformed())?;

        Ok(Self { base })
    }

    /// Build a URL from a literal path starting with `/`.
    ///
    /// Query parameters are appended in the order given.
    pub fn build(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        if !path.starts_with('/') {
            return Err(ElasticsearchError::MalformedUrl(format!(
                "path must start with '/': {path}"
            )));
        }

        let mut url = self.base.clone();
        url.set_path(path);
        Self::append_query(&mut url, query);
        Ok(url.into())
    }

    /// Build a URL from path segments, percent-encoding each segment.
    ///
    /// Index names and document ids go through here so that characters such as
    /// `/` or `?` in an id cannot change the request target. Empty, `.` and `..`
    /// segments would be dropped or collapsed when the path is normalized, so
    /// they are rejected as [`MalformedUrl`](ElasticsearchError::MalformedUrl).
    pub fn build_segments(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
        if let Some(segment) = segments
            .iter()
            .find(|segment| matches!(**segment, "" | "." | ".."))
        {
            return Err(ElasticsearchError::MalformedUrl(format!(
                "path segment {segment:?} is not addressable"
            )));
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ElasticsearchError::MalformedUrl(format!("{} cannot be a base", self.base))
            })?
            .clear()
            .extend(segments);
        Self::append_query(&mut url, query);
        Ok(url.into())
    }

    fn append_query(url: &mut Url, query: &[(&str, &str)]) {
        if query.is_empty() {
            return;
        }
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
}

/// Whether the parsed host is the whole of the configured host string.
///
/// ASCII domains and IPv4 addresses must match exactly (ignoring case). IPv6
/// addresses are normalized by the parser, so only the brackets are checked.
/// Non-ASCII domains are IDNA-encoded and are accepted as parsed.
fn same_host(parsed: Option<Host<&str>>, configured: &str) -> bool {
    match parsed {
        Some(Host::Domain(domain)) => {
            !configured.is_ascii() || domain.eq_ignore_ascii_case(configured)
        }
        Some(Host::Ipv4(addr)) => addr.to_string() == configured,
        Some(Host::Ipv6(_)) => configured.starts_with('[') && configured.ends_with(']'),
        None => false,
    }
}
