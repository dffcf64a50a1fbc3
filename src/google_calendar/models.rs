use crate::error::{invalid_event_error, CalendarResult};
use crate::utils::time::date_to_offset_datetime;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Start or end of an event: either a timed instant or an all-day date
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn timed(date_time: DateTime<FixedOffset>) -> Self {
        Self {
            date_time: Some(date_time),
            ..Default::default()
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }

    /// The instant this time refers to; all-day dates resolve to midnight UTC
    pub fn instant(&self) -> CalendarResult<DateTime<FixedOffset>> {
        match (&self.date_time, &self.date) {
            (Some(date_time), _) => Ok(*date_time),
            (None, Some(date)) => date_to_offset_datetime(*date, 0),
            (None, None) => Err(invalid_event_error("event time has neither dateTime nor date")),
        }
    }
}

/// Calendar event as exchanged with the Google Calendar API.
///
/// Fields this crate does not model are kept in `extra` so a listed event can
/// be sent back without losing data.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CalendarEvent {
    /// A new event between two instants
    pub fn timed(
        summary: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            summary: Some(summary.into()),
            start: EventTime::timed(start),
            end: EventTime::timed(end),
            ..Default::default()
        }
    }

    /// A new all-day event; `end_date` is exclusive, as in the API
    pub fn all_day(summary: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            summary: Some(summary.into()),
            start: EventTime::all_day(start_date),
            end: EventTime::all_day(end_date),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn event_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn event_title(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn event_start_instant(&self) -> CalendarResult<DateTime<FixedOffset>> {
        self.start.instant()
    }

    pub fn event_end_instant(&self) -> CalendarResult<DateTime<FixedOffset>> {
        self.end.instant()
    }
}

/// One page of an events list response
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventsPage {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
