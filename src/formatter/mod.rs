//! Access-line formatting.
//!
//! [`AccessLineFormatter`] turns a [`RequestFact`] / [`ResponseFact`] pair
//! into a single line according to a [`FormatTemplate`]. Formatting is pure:
//! identical inputs always produce byte-identical output.

mod fields;

use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::{
    request::{RequestFact, ResponseFact},
    template::{FormatTemplate, Placeholder, Segment},
};

pub use fields::Fingerprint;
use fields::ResolvedFields;

/// Rendering used for `%t`.
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S UTC %Y";

/// Feature toggles controlling the optional sections of a line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Render `%rh`.
    pub request_headers: bool,
    /// Render `%post` for POST requests.
    pub post: bool,
    /// Render `%response` for 4xx/5xx responses.
    pub response: bool,
}

impl FormatOptions {
    pub fn with_request_headers(mut self, enabled: bool) -> Self {
        self.request_headers = enabled;
        self
    }

    pub fn with_post(mut self, enabled: bool) -> Self {
        self.post = enabled;
        self
    }

    pub fn with_response(mut self, enabled: bool) -> Self {
        self.response = enabled;
        self
    }
}

/// A formatted line plus the identity used for duplicate collapsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedLine {
    pub text: String,
    pub fingerprint: Fingerprint,
}

/// Formats requests according to a parsed template.
#[derive(Clone, Debug, Default)]
pub struct AccessLineFormatter {
    template: FormatTemplate,
}

impl AccessLineFormatter {
    pub fn new(template: FormatTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &FormatTemplate {
        &self.template
    }

    /// Format one completed request.
    ///
    /// Each segment of the template is rendered in order; substituted values
    /// are never reinterpreted. Leading and trailing whitespace is trimmed
    /// from the assembled line.
    pub fn format(
        &self,
        request: &RequestFact,
        response: Option<&ResponseFact>,
        elapsed: Duration,
        options: FormatOptions,
    ) -> FormattedLine {
        let fields = ResolvedFields::resolve(request, response);
        let mut out = String::with_capacity(self.template.source().len() + request.url.len() + 64);

        for segment in self.template.segments() {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(placeholder) => {
                    render_field(&mut out, *placeholder, &fields, request, elapsed);
                }
                Segment::Section {
                    placeholder,
                    wrapper,
                } => {
                    let Some(value) = section_value(*placeholder, request, response, options)
                    else {
                        continue;
                    };
                    match wrapper {
                        Some((open, close)) => {
                            out.push(*open);
                            out.push_str(&value);
                            out.push(*close);
                        }
                        None => out.push_str(&value),
                    }
                }
            }
        }

        FormattedLine {
            text: out.trim().to_owned(),
            fingerprint: fields.fingerprint(),
        }
    }
}

/// Render a request timestamp for `%t`.
pub fn format_timestamp(timestamp: SystemTime) -> String {
    DateTime::<Utc>::from(timestamp)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

fn render_field(
    out: &mut String,
    placeholder: Placeholder,
    fields: &ResolvedFields<'_>,
    request: &RequestFact,
    elapsed: Duration,
) {
    match placeholder {
        Placeholder::Host => out.push_str(fields.host),
        Placeholder::RemoteAddress => out.push_str(fields.remote_address),
        Placeholder::User => out.push_str(fields.user),
        Placeholder::Timestamp => out.push_str(&format_timestamp(request.timestamp)),
        Placeholder::Method => out.push_str(fields.method),
        Placeholder::Url => out.push_str(fields.url),
        Placeholder::Status => out.push_str(&fields.status),
        Placeholder::Bytes => out.push_str(&fields.bytes),
        Placeholder::Referrer => out.push_str(fields.referrer),
        Placeholder::UserAgent => out.push_str(fields.user_agent),
        Placeholder::ElapsedMillis => out.push_str(&elapsed.as_millis().to_string()),
        // Sections are only ever parsed as `Segment::Section`.
        Placeholder::RequestHeaders | Placeholder::PostBody | Placeholder::ResponseBody => {}
    }
}

/// Value of an optional section, or `None` when the section is disabled.
///
/// An enabled section with nothing to show yields an empty string so the
/// wrapper is still rendered.
fn section_value(
    placeholder: Placeholder,
    request: &RequestFact,
    response: Option<&ResponseFact>,
    options: FormatOptions,
) -> Option<String> {
    match placeholder {
        Placeholder::RequestHeaders => options.request_headers.then(|| {
            request
                .headers
                .pairs()
                .map(|(name, value)| format!("\"{name}: {value}\""))
                .collect::<Vec<_>>()
                .join(", ")
        }),
        Placeholder::PostBody => (options.post && request.is_post())
            .then(|| request.post_body.clone().unwrap_or_default()),
        Placeholder::ResponseBody => response
            .filter(|r| options.response && r.is_error_status())
            .map(|r| r.body.clone().unwrap_or_default()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::time::UNIX_EPOCH;

    #[fixture]
    fn formatter() -> AccessLineFormatter {
        AccessLineFormatter::default()
    }

    fn get_a() -> RequestFact {
        RequestFact::new("GET", "/a")
            .with_host("x")
            .with_remote_address("10.0.0.1")
            .with_timestamp(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }

    #[rstest]
    fn default_line_without_optional_sections(formatter: AccessLineFormatter) {
        let line = formatter.format(
            &get_a(),
            Some(&ResponseFact::new(200, 10)),
            Duration::from_millis(7),
            FormatOptions::default(),
        );
        assert_eq!(
            line.text,
            "x 10.0.0.1 - - [Tue Nov 14 22:13:20 UTC 2023] GET \"/a\" 200 10 \"\" \"\" 7"
        );
    }

    #[rstest]
    fn headers_render_in_insertion_order(formatter: AccessLineFormatter) {
        let req = get_a()
            .with_header("Referer", "http://r/")
            .with_header("User-Agent", "ua/1")
            .with_header("Accept", "a")
            .with_header("accept", "b");
        let line = formatter.format(
            &req,
            None,
            Duration::ZERO,
            FormatOptions::default().with_request_headers(true),
        );
        assert!(line.text.ends_with(
            "\"http://r/\" \"ua/1\" 0 [\"Referer: http://r/\", \"User-Agent: ua/1\", \"Accept: a\", \"Accept: b\"]"
        ));
    }

    #[rstest]
    fn enabled_headers_without_any_keep_brackets(formatter: AccessLineFormatter) {
        let line = formatter.format(
            &get_a(),
            None,
            Duration::ZERO,
            FormatOptions::default().with_request_headers(true),
        );
        assert!(line.text.ends_with(" 0 []"));
    }

    #[rstest]
    #[case(Some("a=1"), true, "\"a=1\"")]
    #[case(Some(""), true, "\"\"")]
    #[case(None, true, "\"\"")]
    #[case(Some("a=1"), false, "")]
    fn post_section(
        formatter: AccessLineFormatter,
        #[case] body: Option<&str>,
        #[case] enabled: bool,
        #[case] expected_tail: &str,
    ) {
        let mut req = RequestFact::new("POST", "/p").with_timestamp(UNIX_EPOCH);
        req.post_body = body.map(str::to_owned);
        let line = formatter.format(
            &req,
            None,
            Duration::ZERO,
            FormatOptions::default().with_post(enabled),
        );
        let expected = format!(
            "- - [Thu Jan 01 00:00:00 UTC 1970] POST \"/p\" - - \"\" \"\" 0  {expected_tail}"
        );
        assert_eq!(line.text, expected.trim());
    }

    #[rstest]
    fn post_section_ignores_other_methods(formatter: AccessLineFormatter) {
        let req = get_a().with_post_body("ignored");
        let line = formatter.format(&req, None, Duration::ZERO, FormatOptions::default().with_post(true));
        assert!(!line.text.contains("ignored"));
        assert!(line.text.ends_with(" 0"));
    }

    #[rstest]
    #[case(ResponseFact::new(500, 0).with_body("boom"), true, "\"boom\"")]
    #[case(ResponseFact::new(404, 0), true, "\"\"")]
    #[case(ResponseFact::new(200, 0).with_body("fine"), true, "")]
    #[case(ResponseFact::new(500, 0).with_body("boom"), false, "")]
    fn response_section(
        formatter: AccessLineFormatter,
        #[case] response: ResponseFact,
        #[case] enabled: bool,
        #[case] expected_tail: &str,
    ) {
        let line = formatter.format(
            &get_a(),
            Some(&response),
            Duration::ZERO,
            FormatOptions::default().with_response(enabled),
        );
        if expected_tail.is_empty() {
            assert!(!line.text.ends_with('"'), "{}", line.text);
        } else {
            assert!(line.text.ends_with(&format!(" 0   {expected_tail}")), "{}", line.text);
        }
    }

    #[rstest]
    fn percent_sequences_in_values_are_not_substituted(formatter: AccessLineFormatter) {
        let req = RequestFact::new("GET", "/%ua/%s")
            .with_host("%v")
            .with_header("User-Agent", "%r")
            .with_timestamp(UNIX_EPOCH);
        let line = formatter.format(&req, None, Duration::ZERO, FormatOptions::default());
        assert_eq!(
            line.text,
            "%v  - - [Thu Jan 01 00:00:00 UTC 1970] GET \"/%ua/%s\" - - \"\" \"%r\" 0"
        );
    }

    #[rstest]
    fn custom_template(#[values("%m %r -> %s in %rtms")] source: &str) {
        let formatter = AccessLineFormatter::new(FormatTemplate::parse(source).expect("parses"));
        let line = formatter.format(
            &get_a(),
            Some(&ResponseFact::new(201, 2)),
            Duration::from_millis(12),
            FormatOptions::default(),
        );
        assert_eq!(line.text, "GET /a -> 201 in 12ms");
    }
}
