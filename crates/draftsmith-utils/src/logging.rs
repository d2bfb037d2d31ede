//! Logging and observability for draftsmith
//!
//! Structured logging through `tracing`. Stages log through the `tracing`
//! macros directly; this module owns subscriber setup and the run/stage span
//! helpers so every log line of a run carries the run id.

use std::io::IsTerminal;
use tracing::{Level, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_error_message;

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and NO_COLOR is unset.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Default filter directives when `RUST_LOG` is not set.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "draftsmith=debug,info"
    } else {
        "draftsmith=info,warn"
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `verbose` selects between
/// `draftsmith=debug,info` and `draftsmith=info,warn`. `json` switches the
/// formatter to newline-delimited JSON for machine consumption. Logs go to
/// stderr so stdout stays free for documents and JSON results.
pub fn init_tracing(verbose: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()?;
    } else if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering a whole generation run.
#[must_use]
pub fn run_span(run_id: &str, blueprint: &str) -> tracing::Span {
    span!(Level::INFO, "run", run_id = %run_id, blueprint = %blueprint)
}

/// Span covering one pipeline stage (skeleton, section, verify, ...).
#[must_use]
pub fn stage_span(stage: &str, section_id: Option<&str>) -> tracing::Span {
    span!(
        Level::INFO,
        "stage",
        stage = %stage,
        section_id = section_id.unwrap_or("")
    )
}

/// Record a stage finishing, with the number of completion calls it spent.
pub fn log_stage_complete(stage: &str, calls: u32, duration_ms: u128) {
    info!(stage = %stage, calls, duration_ms, "Stage completed");
}

/// Record a degraded stage outcome. The reason is redacted before logging.
pub fn log_degraded(stage: &str, reason: &str) {
    let reason = redact_error_message(reason);
    warn!(stage = %stage, reason = %reason, "Stage degraded");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(false), "draftsmith=info,warn");
        assert_eq!(default_filter(true), "draftsmith=debug,info");
    }

    #[test]
    fn test_spans_can_be_created_without_subscriber() {
        let span = run_span("20260101-000000-abcd1234", "project-charter");
        let _guard = span.enter();
        let inner = stage_span("section", Some("scope"));
        let _inner = inner.enter();
        log_stage_complete("section", 2, 15);
        log_degraded("skeleton", "missing ids: scope");
    }
}
