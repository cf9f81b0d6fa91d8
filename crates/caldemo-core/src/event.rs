//! Calendar event representation exchanged with the remote API.
//!
//! The field names follow the Google Calendar v3 JSON schema (camelCase).
//! Fields this crate does not model are kept in [`CalendarEvent::extra`] so a
//! fetched event can be sent back in full on update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A calendar event.
///
/// `id` and `html_link` are assigned by the remote service and are absent on
/// a locally constructed event until it has been created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub start: EventDateTime,

    #[serde(default)]
    pub end: EventDateTime,

    /// Link to the event in the web UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,

    /// Server-side fields not modelled above (etag, status, creator, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CalendarEvent {
    /// Creates an event with the given summary and time range.
    pub fn new(summary: impl Into<String>, start: EventDateTime, end: EventDateTime) -> Self {
        Self {
            summary: Some(summary.into()),
            start,
            end,
            ..Default::default()
        }
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the html link, or an empty string if the service gave none.
    pub fn link(&self) -> &str {
        self.html_link.as_deref().unwrap_or_default()
    }
}

/// Start or end of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,

    /// All-day date (`YYYY-MM-DD`), used instead of `date_time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// IANA time zone name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// Creates a timed value in the given time zone.
    pub fn at(date_time: DateTime<Utc>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time),
            date: None,
            time_zone: Some(time_zone.into()),
        }
    }
}
