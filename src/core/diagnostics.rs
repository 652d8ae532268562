//! Debug-only diagnostic channel
//!
//! The pipeline never reports failures to the application. When the
//! `CLOUDWATCH_APPENDER_DEBUG` environment variable is set (to anything),
//! or debug output was switched on with [`set_enabled`], internal failures are
//! written to stderr. Otherwise this channel is silent.

use std::error::Error;
use std::fmt::Display;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

/// Environment variable that enables the diagnostic channel
pub const DEBUG_ENV_VAR: &str = "CLOUDWATCH_APPENDER_DEBUG";

const UNSET: u8 = 0;
const ON: u8 = 1;
const OFF: u8 = 2;

static OVERRIDE: AtomicU8 = AtomicU8::new(UNSET);
static FROM_ENV: OnceLock<bool> = OnceLock::new();

/// Force diagnostic output on or off, ignoring the environment
pub fn set_enabled(enabled: bool) {
    OVERRIDE.store(if enabled { ON } else { OFF }, Ordering::Relaxed);
}

/// Whether diagnostics are currently written
pub fn is_enabled() -> bool {
    match OVERRIDE.load(Ordering::Relaxed) {
        ON => true,
        OFF => false,
        _ => *FROM_ENV.get_or_init(|| std::env::var_os(DEBUG_ENV_VAR).is_some()),
    }
}

pub fn debug(message: impl Display) {
    if is_enabled() {
        eprintln!("[CLOUDWATCH DEBUG] {}", message);
    }
}

/// Write a message followed by the error and its source chain
pub fn debug_error(message: impl Display, error: &(dyn Error + 'static)) {
    if is_enabled() {
        eprintln!("[CLOUDWATCH DEBUG] {} {}", message, render_chain(error));
    }
}

fn render_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
