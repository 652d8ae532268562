//! Monthly stream naming

use crate::core::Clock;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::sync::Arc;

const PERIOD_FORMAT: &str = "%Y/%m";

/// Stream name for the calendar month containing `now`
///
/// The period is taken in `now`'s own time zone. A prefix that is blank after
/// trimming is ignored; otherwise it is used exactly as given.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use cloudwatch_appender::shipping::stream_name_for;
///
/// let now = Utc.with_ymd_and_hms(2017, 9, 14, 8, 0, 0).unwrap();
/// assert_eq!(stream_name_for(Some("app"), &now), "app/2017/09");
/// assert_eq!(stream_name_for(Some("  "), &now), "2017/09");
/// assert_eq!(stream_name_for(None, &now), "2017/09");
/// ```
pub fn stream_name_for<Tz>(prefix: Option<&str>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let period = now.format(PERIOD_FORMAT);
    match prefix {
        Some(prefix) if !prefix.trim().is_empty() => format!("{}/{}", prefix, period),
        _ => period.to_string(),
    }
}

/// Resolves the current stream name from a prefix and a clock
pub struct StreamNamer {
    prefix: Option<String>,
    clock: Arc<dyn Clock>,
}

impl StreamNamer {
    pub fn new(prefix: Option<String>, clock: Arc<dyn Clock>) -> Self {
        Self { prefix, clock }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn current_name(&self) -> String {
        stream_name_for(self.prefix.as_deref(), &self.clock.now())
    }
}
