//! Resolution of the identity fields shared by formatting and duplicate
//! detection.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::request::{RequestFact, ResponseFact};

/// Sentinel rendered for absent values.
pub(crate) const MISSING: &str = "-";

/// Identity of a line for duplicate collapsing.
///
/// Covers host, peer, user, method, URL, resolved status and size, referrer
/// and user agent. Timestamps and elapsed time are left out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Output values for the fingerprinted placeholders, after `-` resolution.
#[derive(Debug)]
pub(crate) struct ResolvedFields<'a> {
    pub(crate) host: &'a str,
    pub(crate) remote_address: &'a str,
    pub(crate) user: &'a str,
    pub(crate) method: &'a str,
    pub(crate) url: &'a str,
    pub(crate) status: String,
    pub(crate) bytes: String,
    pub(crate) referrer: &'a str,
    pub(crate) user_agent: &'a str,
}

impl<'a> ResolvedFields<'a> {
    pub(crate) fn resolve(request: &'a RequestFact, response: Option<&ResponseFact>) -> Self {
        let (status, bytes) = match application_response(request, response) {
            Some(resp) => (resp.status.to_string(), resp.body_len.to_string()),
            None => (MISSING.to_owned(), MISSING.to_owned()),
        };
        Self {
            host: &request.host,
            remote_address: &request.remote_address,
            user: request
                .user
                .as_deref()
                .filter(|u| !u.is_empty())
                .unwrap_or(MISSING),
            method: &request.method,
            url: &request.url,
            status,
            bytes,
            referrer: request.headers.get("referer").unwrap_or_default(),
            user_agent: request.headers.get("user-agent").unwrap_or_default(),
        }
    }

    pub(crate) fn fingerprint(&self) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        for field in [
            self.host,
            self.remote_address,
            self.user,
            self.method,
            self.url,
            self.status.as_str(),
            self.bytes.as_str(),
            self.referrer,
            self.user_agent,
        ] {
            field.hash(&mut hasher);
        }
        Fingerprint(hasher.finish())
    }
}

/// The response, if status and size can be trusted.
///
/// Static files and framework error pages do not report a reliable status
/// or body size, so only application responses with a body qualify.
fn application_response<'r>(
    request: &RequestFact,
    response: Option<&'r ResponseFact>,
) -> Option<&'r ResponseFact> {
    response.filter(|r| request.routed_to_application && r.body_len > 0)
}
