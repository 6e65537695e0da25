//! Normalised request and response facts consumed by the access logger.
//!
//! The surrounding server builds one [`RequestFact`] (and, when the response
//! is known, one [`ResponseFact`]) per completed request and hands them to
//! [`crate::AccessLogger`]. Nothing here reads ambient request state.

use std::time::{Duration, SystemTime};

/// A single header name together with every value received for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Header name as first received.
    pub name: String,
    /// Values in arrival order.
    pub values: Vec<String>,
}

/// Ordered, case-insensitive header multimap.
///
/// Names keep the order in which they were first inserted. Appending a value
/// for a name already present (ignoring ASCII case) extends that entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.values.push(value),
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value],
            }),
        }
    }

    /// Return the first value stored for `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .and_then(|e| e.values.first())
            .map(String::as_str)
    }

    /// Iterate over every `(name, value)` pair in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|e| {
            e.values
                .iter()
                .map(move |v| (e.name.as_str(), v.as_str()))
        })
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// Immutable description of a completed request.
#[derive(Clone, Debug)]
pub struct RequestFact {
    /// Virtual host the request targeted.
    pub host: String,
    /// Peer address as reported by the server.
    pub remote_address: String,
    /// Authenticated user, if any.
    pub user: Option<String>,
    /// Time the request started.
    pub timestamp: SystemTime,
    /// HTTP method, upper case.
    pub method: String,
    /// Request URL (path and query).
    pub url: String,
    /// Request headers in arrival order.
    pub headers: Headers,
    /// Raw POST body, if one was read.
    pub post_body: Option<String>,
    /// Whether the request reached application code (as opposed to a static
    /// file or a framework error page).
    pub routed_to_application: bool,
}

impl RequestFact {
    /// Create a fact for `method url` started now, routed to application code.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            remote_address: String::new(),
            user: None,
            timestamp: SystemTime::now(),
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            post_body: None,
            routed_to_application: true,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_remote_address(mut self, addr: impl Into<String>) -> Self {
        self.remote_address = addr.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_post_body(mut self, body: impl Into<String>) -> Self {
        self.post_body = Some(body.into());
        self
    }

    pub fn with_routed_to_application(mut self, routed: bool) -> Self {
        self.routed_to_application = routed;
        self
    }

    /// Whether this is a `POST` request. Method names are case-sensitive.
    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    /// Time elapsed between the request start and `now`.
    ///
    /// A start time in the future (clock skew) yields zero.
    pub fn elapsed_since(&self, now: SystemTime) -> Duration {
        now.duration_since(self.timestamp).unwrap_or_default()
    }
}

/// Immutable description of the response sent for a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseFact {
    /// HTTP status code.
    pub status: u16,
    /// Length in bytes of the response body.
    pub body_len: usize,
    /// Response body text, kept only when error bodies may be logged.
    pub body: Option<String>,
}

impl ResponseFact {
    pub fn new(status: u16, body_len: usize) -> Self {
        Self {
            status,
            body_len,
            body: None,
        }
    }

    /// Attach the body text; `body_len` is updated to its byte length.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body_len = body.len();
        self.body = Some(body);
        self
    }

    /// Whether the status is in the 4xx or 5xx class.
    pub fn is_error_status(&self) -> bool {
        matches!(self.status / 100, 4 | 5)
    }
}
