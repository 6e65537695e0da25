//! Snapshot of the logger's runtime switches.

/// Every runtime toggle of an [`super::AccessLogger`].
///
/// Used to read or replace all switches at once, e.g. from an admin
/// console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Toggles {
    pub enabled: bool,
    pub log_request_headers: bool,
    pub log_post: bool,
    pub log_response: bool,
    pub console_enabled: bool,
}

impl Default for Toggles {
    /// Logging on, optional sections and console off.
    fn default() -> Self {
        Self {
            enabled: true,
            log_request_headers: false,
            log_post: false,
            log_response: false,
            console_enabled: false,
        }
    }
}

impl Toggles {
    pub fn with_enabled(mut self, flag: bool) -> Self {
        self.enabled = flag;
        self
    }

    pub fn with_log_request_headers(mut self, flag: bool) -> Self {
        self.log_request_headers = flag;
        self
    }

    pub fn with_log_post(mut self, flag: bool) -> Self {
        self.log_post = flag;
        self
    }

    pub fn with_log_response(mut self, flag: bool) -> Self {
        self.log_response = flag;
        self
    }

    pub fn with_console_enabled(mut self, flag: bool) -> Self {
        self.console_enabled = flag;
        self
    }
}
