//! Access-log format templates.
//!
//! A template such as [`DEFAULT_FORMAT`] is parsed once into an ordered list
//! of literal fragments and placeholders. Formatting walks the segments and
//! never rescans substituted text, so `%` sequences inside request data are
//! emitted verbatim.

use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Format used when none is configured.
pub const DEFAULT_FORMAT: &str =
    "%v %h - %u [%t] %m \"%r\" %s %b \"%ref\" \"%ua\" %rt [%rh] \"%post\" \"%response\"";

static DEFAULT_TEMPLATE: Lazy<FormatTemplate> = Lazy::new(|| FormatTemplate::parse_unchecked(DEFAULT_FORMAT));

/// Errors raised while parsing a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template contained no characters at all.
    #[error("format template must not be empty")]
    Empty,
}

/// Named substitution points understood by the formatter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `%v`
    Host,
    /// `%h`
    RemoteAddress,
    /// `%u`
    User,
    /// `%t`
    Timestamp,
    /// `%m`
    Method,
    /// `%r`
    Url,
    /// `%s`
    Status,
    /// `%b`
    Bytes,
    /// `%ref`
    Referrer,
    /// `%ua`
    UserAgent,
    /// `%rt`
    ElapsedMillis,
    /// `%rh`
    RequestHeaders,
    /// `%post`
    PostBody,
    /// `%response`
    ResponseBody,
}

impl Placeholder {
    /// Every placeholder, longest token first so `%response` wins over `%r`.
    const BY_TOKEN_LENGTH: [Placeholder; 14] = [
        Placeholder::ResponseBody,
        Placeholder::PostBody,
        Placeholder::Referrer,
        Placeholder::ElapsedMillis,
        Placeholder::RequestHeaders,
        Placeholder::UserAgent,
        Placeholder::Host,
        Placeholder::RemoteAddress,
        Placeholder::User,
        Placeholder::Timestamp,
        Placeholder::Method,
        Placeholder::Url,
        Placeholder::Status,
        Placeholder::Bytes,
    ];

    /// The token as written in a template.
    pub fn token(self) -> &'static str {
        match self {
            Self::Host => "%v",
            Self::RemoteAddress => "%h",
            Self::User => "%u",
            Self::Timestamp => "%t",
            Self::Method => "%m",
            Self::Url => "%r",
            Self::Status => "%s",
            Self::Bytes => "%b",
            Self::Referrer => "%ref",
            Self::UserAgent => "%ua",
            Self::ElapsedMillis => "%rt",
            Self::RequestHeaders => "%rh",
            Self::PostBody => "%post",
            Self::ResponseBody => "%response",
        }
    }

    /// Delimiters that belong to an optional section, if this placeholder
    /// is one.
    fn section_wrapper(self) -> Option<(char, char)> {
        match self {
            Self::RequestHeaders => Some(('[', ']')),
            Self::PostBody | Self::ResponseBody => Some(('"', '"')),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn longest_match(rest: &str) -> Option<Placeholder> {
        Self::BY_TOKEN_LENGTH
            .into_iter()
            .find(|p| rest.starts_with(p.token()))
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One parsed piece of a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Text copied to the output unchanged.
    Literal(String),
    /// A placeholder that always renders a value.
    Field(Placeholder),
    /// An optional section (`%rh`, `%post`, `%response`).
    ///
    /// `wrapper` holds the delimiters that enclosed the placeholder in the
    /// template; they are dropped when the section is disabled and kept
    /// around an empty value otherwise.
    Section {
        placeholder: Placeholder,
        wrapper: Option<(char, char)>,
    },
}

/// Parsed access-log format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FormatTemplate {
    /// Parse `source` into segments.
    ///
    /// Each placeholder is substituted at most once: a token repeated later
    /// in the template stays literal text.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        if source.is_empty() {
            return Err(TemplateError::Empty);
        }
        Ok(Self::parse_unchecked(source))
    }

    fn parse_unchecked(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut seen = [false; Placeholder::BY_TOKEN_LENGTH.len()];
        let mut pos = 0;

        while pos < source.len() {
            let rest = &source[pos..];
            let Some(placeholder) = rest
                .starts_with('%')
                .then(|| Placeholder::longest_match(rest))
                .flatten()
            else {
                // `rest` is non-empty so a next char exists.
                let ch = rest.chars().next().unwrap_or_default();
                literal.push(ch);
                pos += ch.len_utf8();
                continue;
            };

            let token_len = placeholder.token().len();
            if seen[placeholder.index()] {
                literal.push_str(placeholder.token());
                pos += token_len;
                continue;
            }
            seen[placeholder.index()] = true;
            pos += token_len;

            let segment = match placeholder.section_wrapper() {
                Some((open, close))
                    if literal.ends_with(open) && source[pos..].starts_with(close) =>
                {
                    literal.pop();
                    pos += close.len_utf8();
                    Segment::Section {
                        placeholder,
                        wrapper: Some((open, close)),
                    }
                }
                Some(_) => Segment::Section {
                    placeholder,
                    wrapper: None,
                },
                None => Segment::Field(placeholder),
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_owned(),
            segments,
        }
    }

    /// Template text as configured.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `placeholder` is substituted by this template.
    pub fn contains(&self, placeholder: Placeholder) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Field(p) => *p == placeholder,
            Segment::Section { placeholder: p, .. } => *p == placeholder,
            Segment::Literal(_) => false,
        })
    }
}

impl Default for FormatTemplate {
    fn default() -> Self {
        DEFAULT_TEMPLATE.clone()
    }
}

impl fmt::Display for FormatTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
