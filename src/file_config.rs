//! Loading access log settings from INI files.
//!
//! Settings may live in an `[accesslog]` section:
//!
//! ```ini
//! [accesslog]
//! enabled = true
//! logPost = true
//! blacklist = ^GET "/health
//! ```
//!
//! or as `accesslog.`-prefixed keys outside any section, the way Java-style
//! properties files spell them. Section keys win when both are present.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use ini::{Ini, ParseOption, Properties};

use crate::config::{AccessLogConfigBuilder, ConfigError};

const SECTION: &str = "accesslog";
const PREFIX: &str = "accesslog.";

/// Load settings from `path` on top of the file defaults.
///
/// A missing `enabled` key leaves logging switched off, and a missing
/// `console.enabled` key leaves the console following dev mode. `encoding`
/// is a WHATWG label such as `"latin1"`; UTF-8 is used when absent.
pub fn load_file(
    path: impl AsRef<Path>,
    encoding: Option<&str>,
) -> Result<AccessLogConfigBuilder, ConfigError> {
    apply_file(AccessLogConfigBuilder::new().with_enabled(false), path, encoding)
}

/// Apply the settings found in `path` to an existing builder.
///
/// Keys absent from the file keep the builder's values, so sinks and the
/// dev-mode flag can be configured in code first.
pub fn apply_file(
    builder: AccessLogConfigBuilder,
    path: impl AsRef<Path>,
    encoding: Option<&str>,
) -> Result<AccessLogConfigBuilder, ConfigError> {
    let path = path.as_ref().display().to_string();
    let bytes = read_file_bytes(&path)?;
    if bytes.is_empty() {
        return Err(ConfigError::EmptyFile(path));
    }
    let text = decode_contents(&path, &bytes, encoding)?;
    apply_str(builder, &path, &text)
}

/// Apply settings parsed from INI `text`. `origin` names the source in errors.
pub fn apply_str(
    builder: AccessLogConfigBuilder,
    origin: &str,
    text: &str,
) -> Result<AccessLogConfigBuilder, ConfigError> {
    let ini = parse_ini(origin, text)?;
    let settings = Settings::collect(&ini);
    settings.apply(builder)
}

fn read_file_bytes(path: &str) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::FileNotFound(path.to_owned()),
        _ => ConfigError::Io {
            path: path.to_owned(),
            source: err,
        },
    })
}

fn decode_contents(path: &str, bytes: &[u8], label: Option<&str>) -> Result<String, ConfigError> {
    let encoding = match label {
        Some(label) => {
            let normalized_label = label.trim().to_ascii_lowercase();
            Encoding::for_label(normalized_label.as_bytes())
                .ok_or_else(|| ConfigError::UnknownEncoding(label.to_owned()))?
        }
        None => UTF_8,
    };
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConfigError::Decode {
            path: path.to_owned(),
            encoding: encoding.name().to_owned(),
        });
    }
    Ok(decoded.into_owned())
}

fn parse_ini(origin: &str, text: &str) -> Result<Ini, ConfigError> {
    // Regexes and formats carry backslashes and quotes that must survive.
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    Ini::load_from_str_opt(text, options).map_err(|err| ConfigError::Parse {
        path: origin.to_owned(),
        message: err.to_string(),
    })
}

/// Raw values gathered from both key spellings.
#[derive(Debug, Default)]
struct Settings {
    enabled: Option<String>,
    log_request_headers: Option<String>,
    log_post: Option<String>,
    log_response: Option<String>,
    console_enabled: Option<String>,
    console_capacity: Option<String>,
    blacklist: Option<String>,
    format: Option<String>,
}

impl Settings {
    fn collect(ini: &Ini) -> Self {
        let mut settings = Self::default();
        if let Some(general) = ini.section(None::<String>) {
            settings.merge(general, PREFIX);
        }
        if let Some(section) = ini.section(Some(SECTION)) {
            settings.merge(section, "");
        }
        settings
    }

    fn merge(&mut self, props: &Properties, prefix: &str) {
        for (key, value) in props.iter() {
            let Some(name) = key.strip_prefix(prefix) else {
                continue;
            };
            let slot = match name {
                "enabled" => &mut self.enabled,
                "logRequestHeaders" => &mut self.log_request_headers,
                "logPost" => &mut self.log_post,
                "logResponse" => &mut self.log_response,
                "console.enabled" => &mut self.console_enabled,
                "console.capacity" => &mut self.console_capacity,
                "blacklist" => &mut self.blacklist,
                "format" => &mut self.format,
                _ => continue,
            };
            *slot = Some(value.to_owned());
        }
    }

    fn apply(self, mut builder: AccessLogConfigBuilder) -> Result<AccessLogConfigBuilder, ConfigError> {
        if let Some(v) = self.enabled {
            builder = builder.with_enabled(parse_bool(&v));
        }
        if let Some(v) = self.log_request_headers {
            builder = builder.with_log_request_headers(parse_bool(&v));
        }
        if let Some(v) = self.log_post {
            builder = builder.with_log_post(parse_bool(&v));
        }
        if let Some(v) = self.log_response {
            builder = builder.with_log_response(parse_bool(&v));
        }
        if let Some(v) = self.console_enabled {
            builder = builder.with_console_enabled(parse_bool(&v));
        }
        if let Some(v) = self.console_capacity {
            let capacity = v.trim().parse::<usize>().map_err(|err| {
                ConfigError::InvalidConfig(format!("console.capacity {v:?}: {err}"))
            })?;
            builder = builder.with_console_capacity(capacity);
        }
        if let Some(v) = self.blacklist {
            builder = builder.with_blacklist(v);
        }
        if let Some(v) = self.format {
            builder = builder.with_format(v);
        }
        Ok(builder)
    }
}

/// `true` in any letter case is true; everything else is false.
fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
