//! Calendar event operations for an authorized session.

pub mod api;
pub mod client;
pub mod runner;

pub use api::CalendarApi;
pub use client::{DEFAULT_API_BASE, GoogleCalendarClient};
pub use runner::{
    CalendarOperationRunner, DEFAULT_CALENDAR_ID, DEFAULT_TIME_ZONE, DemoOptions,
    apply_demo_update, demo_event, run_demo,
};
