//! The calendar service seam.

use caldemo_core::{BoxFuture, CalendarEvent, DemoResult};

/// Event operations against a remote calendar.
///
/// Implementations report failures as `RemoteApiError`; a missing event
/// carries status 404 so callers can use `DemoError::is_not_found`.
pub trait CalendarApi: Send + Sync {
    /// Creates an event and returns it as stored by the service.
    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, DemoResult<CalendarEvent>>;

    /// Replaces an event with the given full representation.
    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, DemoResult<CalendarEvent>>;

    /// Fetches one event.
    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, DemoResult<CalendarEvent>>;

    /// Deletes one event.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, DemoResult<()>>;
}
