use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Query escape set matching JavaScript's `encodeURIComponent`: everything
/// but ASCII alphanumerics and `-`, `_`, `.`, `~` is percent-encoded.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Fully resolved streaming endpoint for one document session.
///
/// Carries the acting user and the target document as query parameters:
/// `{ws_url}?user_email=<enc>&document_id=<enc>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAddress {
    url: String,
}

impl SessionAddress {
    pub fn new(ws_url: &str, user_email: &str, document_id: &str) -> Self {
        let url = format!(
            "{}?user_email={}&document_id={}",
            ws_url,
            utf8_percent_encode(user_email, QUERY_COMPONENT),
            utf8_percent_encode(document_id, QUERY_COMPONENT),
        );
        Self { url }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for SessionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
