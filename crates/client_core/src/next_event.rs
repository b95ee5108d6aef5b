use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use icalendar::{
    parser::{read_calendar, unfold},
    CalendarDateTime, DatePerhapsTime,
};
use shared::domain::{CalendarKind, CalendarList, Entry};
use thiserror::Error;
use tracing::{debug, warn};

/// An event starting inside the look-ahead window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingEvent {
    /// Name of the list entry whose feed carried the event.
    pub calendar: String,
    pub summary: String,
    pub starts_at: DateTime<Utc>,
}

impl UpcomingEvent {
    pub fn starts_in(&self, now: DateTime<Utc>) -> Duration {
        self.starts_at - now
    }
}

/// How far past `now` an event may start and still count, written
/// `{days}.{hh}:{mm}:{ss}` with an optional `.{millis}` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookAhead(Duration);

impl LookAhead {
    pub fn new(window: Duration) -> Self {
        Self(window)
    }

    pub fn window(&self) -> Duration {
        self.0
    }
}

impl Default for LookAhead {
    fn default() -> Self {
        Self(Duration::days(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("look-ahead '{0}' is not in {{days}}.{{hh}}:{{mm}}:{{ss}} form")]
pub struct LookAheadError(String);

impl FromStr for LookAhead {
    type Err = LookAheadError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || LookAheadError(raw.to_string());
        let number = |field: &str| field.parse::<u32>().map(i64::from).map_err(|_| malformed());

        let (days, clock) = raw.trim().split_once('.').ok_or_else(malformed)?;
        let (clock, millis) = clock.split_once('.').unwrap_or((clock, "0"));
        let mut fields = clock.split(':');
        let (Some(hours), Some(minutes), Some(seconds), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed());
        };

        Ok(Self(
            Duration::days(number(days)?)
                + Duration::hours(number(hours)?)
                + Duration::minutes(number(minutes)?)
                + Duration::seconds(number(seconds)?)
                + Duration::milliseconds(number(millis)?),
        ))
    }
}

#[derive(Debug, Error)]
pub enum NextEventError {
    #[error("calendar feed request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("calendar feed is not valid iCalendar: {0}")]
    Parse(String),
}

/// Looks up the next event across the `ics-url` entries of a list.
#[derive(Debug, Clone, Default)]
pub struct NextEventFinder {
    http: reqwest::Client,
}

impl NextEventFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Earliest event starting in `[now, now + look_ahead]`.
    ///
    /// Entries of other kinds are skipped, as are feeds that cannot be fetched
    /// or parsed. When two calendars offer the same start time the one higher
    /// in the list wins.
    pub async fn next_event(
        &self,
        calendars: &CalendarList,
        now: DateTime<Utc>,
        look_ahead: LookAhead,
    ) -> Option<UpcomingEvent> {
        let until = now + look_ahead.window();
        let mut next: Option<UpcomingEvent> = None;

        for entry in calendars.iter().filter(|e| e.kind == CalendarKind::IcsUrl) {
            let candidate = match self.fetch_events(entry, now, until).await {
                Ok(events) => events.into_iter().min_by_key(|event| event.starts_at),
                Err(error) => {
                    warn!(calendar = %entry.name, %error, "skipping calendar feed");
                    continue;
                }
            };

            if let Some(candidate) = candidate {
                if next
                    .as_ref()
                    .map_or(true, |current| candidate.starts_at < current.starts_at)
                {
                    next = Some(candidate);
                }
            }
        }

        next
    }

    async fn fetch_events(
        &self,
        entry: &Entry,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<UpcomingEvent>, NextEventError> {
        let Some(url) = entry.url.as_deref() else {
            return Ok(Vec::new());
        };
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        events_in_window(&entry.name, &body, from, until)
    }
}

/// `VEVENT`s of an iCalendar document whose start lies in `[from, until]`.
///
/// All-day starts count from midnight UTC and floating times are read as UTC.
pub fn events_in_window(
    calendar: &str,
    ics: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<UpcomingEvent>, NextEventError> {
    let unfolded = unfold(ics);
    let parsed = read_calendar(&unfolded).map_err(|err| NextEventError::Parse(err.to_string()))?;

    Ok(parsed
        .components
        .iter()
        .filter(|component| component.name == "VEVENT")
        .filter_map(|vevent| {
            let start = DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?;
            let summary = vevent
                .find_prop("SUMMARY")
                .map(|p| p.val.to_string())
                .unwrap_or_else(|| "(No title)".to_string());
            Some(UpcomingEvent {
                calendar: calendar.to_string(),
                summary,
                starts_at: start_in_utc(start)?,
            })
        })
        .filter(|event| from <= event.starts_at && event.starts_at <= until)
        .collect())
}

fn start_in_utc(start: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match start {
        DatePerhapsTime::Date(day) => day
            .and_hms_opt(0, 0, 0)
            .map(|midnight| Utc.from_utc_datetime(&midnight)),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(at)) => Some(at),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(local)) => {
            Some(Utc.from_utc_datetime(&local))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            match tzid.parse::<chrono_tz::Tz>() {
                Ok(zone) => zone
                    .from_local_datetime(&date_time)
                    .earliest()
                    .map(|at| at.with_timezone(&Utc)),
                Err(_) => {
                    debug!(%tzid, "unknown TZID, reading start time as UTC");
                    Some(Utc.from_utc_datetime(&date_time))
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/next_event_tests.rs"]
mod tests;
