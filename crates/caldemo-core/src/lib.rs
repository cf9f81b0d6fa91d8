//! Core types: errors, calendar events, tracing setup

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod event;
pub mod tracing;

pub use error::{DemoError, DemoResult, ErrorCode};
pub use event::{CalendarEvent, EventDateTime};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
