use serde::{Deserialize, Serialize};

use crate::domain::CalendarList;

pub const CALENDARS_ROUTE: &str = "/calendars";
pub const HEALTHZ_ROUTE: &str = "/healthz";

/// Body of `GET /calendars`, of `POST /calendars` and of its response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarsPayload {
    pub calendars: CalendarList,
}

impl CalendarsPayload {
    pub fn new(calendars: CalendarList) -> Self {
        Self { calendars }
    }
}

impl From<CalendarList> for CalendarsPayload {
    fn from(calendars: CalendarList) -> Self {
        Self { calendars }
    }
}
