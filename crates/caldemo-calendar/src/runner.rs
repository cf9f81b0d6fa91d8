//! The create, update and delete demonstration.

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info};

use caldemo_auth::Token;
use caldemo_core::{CalendarEvent, DemoError, DemoResult, EventDateTime};

use crate::api::CalendarApi;
use crate::client::{DEFAULT_API_BASE, GoogleCalendarClient};

/// Calendar used when none is configured.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Time zone of the demonstration event.
pub const DEFAULT_TIME_ZONE: &str = "Asia/Kolkata";

/// Builds the event submitted by [`CalendarOperationRunner::create_event`].
///
/// Starts 24 hours after `now` and lasts one hour.
pub fn demo_event(now: DateTime<Utc>, time_zone: &str) -> CalendarEvent {
    let now = now.trunc_subsecs(0);
    CalendarEvent::new(
        "Test Event",
        EventDateTime::at(now + chrono::Duration::hours(24), time_zone),
        EventDateTime::at(now + chrono::Duration::hours(25), time_zone),
    )
    .with_location("Online")
    .with_description("A test event created using the Google Calendar API")
}

/// Applies the update step's changes in place.
///
/// Only summary, location, description and the start/end instants change;
/// time zones and server fields are left as fetched.
pub fn apply_demo_update(event: &mut CalendarEvent, now: DateTime<Utc>) {
    let now = now.trunc_subsecs(0);
    event.summary = Some("Updated Test Event".to_string());
    event.location = Some("Updated Location".to_string());
    event.description = Some("Updated Description".to_string());
    event.start.date_time = Some(now + chrono::Duration::hours(48));
    event.end.date_time = Some(now + chrono::Duration::hours(49));
}

/// Runs the demonstration operations against one calendar, in order.
pub struct CalendarOperationRunner<A> {
    api: A,
    calendar_id: String,
    time_zone: String,
}

impl<A: CalendarApi> CalendarOperationRunner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Creates the demonstration event and returns its id.
    pub async fn create_event(&self) -> DemoResult<String> {
        let event = demo_event(Utc::now(), &self.time_zone);
        let created = self.api.insert_event(&self.calendar_id, &event).await?;
        println!("Event created: {}", created.link());

        created
            .id
            .ok_or_else(|| DemoError::remote_api("created event has no id"))
    }

    /// Fetches the event, changes it and submits the full representation.
    pub async fn update_event(&self, event_id: &str) -> DemoResult<CalendarEvent> {
        let mut event = self.get_event(event_id).await?;
        apply_demo_update(&mut event, Utc::now());

        let updated = self
            .api
            .update_event(&self.calendar_id, event_id, &event)
            .await?;
        println!("Event updated: {}", updated.link());
        Ok(updated)
    }

    pub async fn get_event(&self, event_id: &str) -> DemoResult<CalendarEvent> {
        let event = self.api.get_event(&self.calendar_id, event_id).await?;
        debug!("retrieved event {}", event_id);
        Ok(event)
    }

    pub async fn delete_event(&self, event_id: &str) -> DemoResult<()> {
        self.api.delete_event(&self.calendar_id, event_id).await?;
        println!("Event deleted successfully.");
        Ok(())
    }

    /// Create, update, then delete one event. Stops at the first failure.
    pub async fn run(&self) -> DemoResult<()> {
        let event_id = self.create_event().await?;
        info!("created event {} in calendar {}", event_id, self.calendar_id);
        self.update_event(&event_id).await?;
        self.delete_event(&event_id).await
    }
}

/// Options for [`run_demo`].
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub calendar_id: String,
    pub time_zone: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Runs the demonstration with the Google client.
///
/// Fails with an authorization error before any request if `token` has
/// expired.
pub async fn run_demo(token: &Token, options: &DemoOptions) -> DemoResult<()> {
    let client =
        GoogleCalendarClient::new(token, options.timeout)?.with_base_url(&options.api_base_url);
    CalendarOperationRunner::new(client)
        .with_calendar_id(&options.calendar_id)
        .with_time_zone(&options.time_zone)
        .run()
        .await
}
