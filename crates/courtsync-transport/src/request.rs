//! Metadata captured from the client's upgrade request.

use url::form_urlencoded;

/// What the client presented while upgrading its connection.
///
/// Only the pieces later layers need are kept: the request path (the
/// room lives there), the raw query string, and the `Authorization`
/// header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Request path, e.g. `/ws/lobby`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Value of the `Authorization` header, if present and valid UTF-8.
    pub authorization: Option<String>,
}

impl ConnectRequest {
    /// Returns the first value of the named query parameter,
    /// percent-decoded (`+` reads as a space).
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}
