//! Connect URL construction.
//!
//! Builds the upgrade URL from session state:
//!
//! ```text
//! {base}{connect|reconnect}?connectionData=<enc(enc)>&connectionToken=<enc>
//!     &groupsToken=<enc>&messageId=<enc>&transport=<name>[&<raw query>]
//! ```
//!
//! then rewrites `http://` to `ws://` and `https://` to `wss://`.
//!
//! `connectionData` is percent-encoded twice because servers decode it
//! twice. Missing optional fields are sent as empty values. The raw query
//! string is appended as-is.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;

use tracing::trace;
use url::Url;

use crate::context::ConnectionContext;
use crate::error::{Error, Result};

use super::ConnectionType;

// ============================================================================
// Constants
// ============================================================================

const HTTPS_PREFIX: &str = "https://";
const HTTP_PREFIX: &str = "http://";
const WSS_PREFIX: &str = "wss://";
const WS_PREFIX: &str = "ws://";

// ============================================================================
// ConnectUrl
// ============================================================================

/// A computed connect URL, before URI parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectUrl {
    /// URL text after scheme rewriting.
    raw: String,
    /// Whether the base URL used `https://`.
    secure: bool,
}

impl ConnectUrl {
    /// Builds the connect URL for `context`.
    ///
    /// # Arguments
    ///
    /// * `context` - Session state to read
    /// * `connection_type` - Selects the `connect` or `reconnect` path
    /// * `transport_name` - Value of the `transport` query parameter
    #[must_use]
    pub fn build(
        context: &dyn ConnectionContext,
        connection_type: ConnectionType,
        transport_name: &str,
    ) -> Self {
        let connection_data = context.connection_data().unwrap_or_default();
        let connection_token = context.connection_token();
        let groups_token = context.groups_token().unwrap_or_default();
        let message_id = context.message_id().unwrap_or_default();

        let mut url = format!(
            "{}{}?connectionData={}&connectionToken={}&groupsToken={}&messageId={}&transport={}",
            context.url(),
            connection_type.path_segment(),
            encode_twice(&connection_data),
            encode(&connection_token),
            encode(&groups_token),
            encode(&message_id),
            encode(transport_name),
        );

        if let Some(query) = context.query_string() {
            url.push('&');
            url.push_str(&query);
        }

        let (raw, secure) = rewrite_scheme(&url);
        trace!(url = %raw, secure, "Connect URL built");

        Self { raw, secure }
    }

    /// Returns the URL text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if the original scheme was `https`.
    #[inline]
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// Parses the URL text as an absolute URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UrlConstruction`] if the text is not a valid URL.
    pub fn parse(&self) -> Result<Url> {
        Url::parse(&self.raw).map_err(|e| Error::url_construction(&self.raw, e.to_string()))
    }
}

impl fmt::Display for ConnectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Rewrites an `http(s)://` prefix to `ws(s)://`.
///
/// Returns the rewritten URL and whether the original scheme was secure.
/// Any other prefix is returned unchanged.
#[must_use]
pub fn rewrite_scheme(url: &str) -> (String, bool) {
    if let Some(rest) = url.strip_prefix(HTTPS_PREFIX) {
        return (format!("{WSS_PREFIX}{rest}"), true);
    }

    if let Some(rest) = url.strip_prefix(HTTP_PREFIX) {
        return (format!("{WS_PREFIX}{rest}"), false);
    }

    (url.to_string(), false)
}

/// Percent-encodes a query value.
#[inline]
fn encode(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Percent-encodes a query value, then encodes the result again.
#[inline]
fn encode_twice(value: &str) -> String {
    urlencoding::encode(&urlencoding::encode(value)).into_owned()
}

// ============================================================================
// Tests
// ============================================================================
