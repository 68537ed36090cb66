//! Logging setup
//!
//! Installs the `tracing` subscriber: an ANSI `fmt` layer on stderr behind a
//! writer that masks bot tokens and Redis passwords, filtered by `RUST_LOG`
//! (default `info`).

use lazy_regex::lazy_regex;
use std::fmt;
use std::io::{self, Write};
use tracing::{info_span, Span};
use tracing_subscriber::{prelude::*, EnvFilter};

static RE_URL_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(https?://[^/\s]+/bot)([0-9]+:[A-Za-z0-9_-]+)");
static RE_BARE_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b");
static RE_REDIS_PASSWORD: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(rediss?://[^:/@\s]*:)[^@\s]+@");

/// Mask credentials in a log line
#[must_use]
pub fn redact(input: &str) -> String {
    let output = RE_URL_TOKEN.replace_all(input, "$1[TELEGRAM_TOKEN]");
    let output = RE_BARE_TOKEN.replace_all(&output, "[TELEGRAM_TOKEN]");
    RE_REDIS_PASSWORD
        .replace_all(&output, "$1[MASKED]@")
        .into_owned()
}

struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&s).as_bytes())?;
        // Report the original length, the redacted one may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
        }
    }
}

/// Install the global subscriber
pub fn init_logging() {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(make_writer),
        )
        .init();
}

/// Component a log line comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Auto-forwarder
    Forward,
    /// Deletion/edit detector
    Detector,
    /// Debug command listener
    Debug,
}

impl Mode {
    /// Span wrapping the component's work
    #[must_use]
    pub fn span(self) -> Span {
        match self {
            Self::Forward => info_span!("forward"),
            Self::Detector => info_span!("detector"),
            Self::Debug => info_span!("debug"),
        }
    }

    /// Span name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Detector => "detector",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_bot_tokens() {
        let token = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw_";
        let url = format!("GET https://api.telegram.org/bot{token}/getMe failed");
        assert_eq!(
            redact(&url),
            "GET https://api.telegram.org/bot[TELEGRAM_TOKEN]/getMe failed"
        );
        assert_eq!(redact(&format!("token={token}")), "token=[TELEGRAM_TOKEN]");
    }

    #[test]
    fn test_redacts_redis_password() {
        assert_eq!(
            redact("connecting to redis://:hunter2@cache:6379/0"),
            "connecting to redis://:[MASKED]@cache:6379/0"
        );
        assert_eq!(redact("redis://cache:6379/0"), "redis://cache:6379/0");
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(Mode::Forward.to_string(), "forward");
        assert_eq!(Mode::Detector.as_str(), "detector");
        assert_eq!(Mode::Debug.to_string(), "debug");
    }
}
