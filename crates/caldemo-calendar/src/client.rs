//! Google Calendar v3 REST client.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::debug;

use caldemo_auth::Token;
use caldemo_core::{BoxFuture, CalendarEvent, DemoError, DemoResult};

use crate::api::CalendarApi;

/// Base URL for Google Calendar API v3.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Bearer-authenticated calendar client bound to one access token.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Creates a client for the given token.
    ///
    /// An expired token is refused; the caller must obtain a fresh one first.
    pub fn new(token: &Token, timeout: Duration) -> DemoResult<Self> {
        if token.is_expired() {
            return Err(DemoError::authorization(
                "refusing to start a calendar session with an expired token",
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DemoError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            base_url: DEFAULT_API_BASE.to_string(),
            access_token: token.access_token.clone(),
        })
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> DemoResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                let detail = if e.is_timeout() {
                    "request timeout"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                DemoError::remote_api(format!("unable to {}: {}", operation, detail)).with_source(e)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = if status == StatusCode::UNAUTHORIZED {
            "access token expired or invalid"
        } else {
            body.trim()
        };
        Err(DemoError::remote_api(format!("unable to {}: {}", operation, detail))
            .with_status(status.as_u16()))
    }

    async fn read_event(response: Response, operation: &str) -> DemoResult<CalendarEvent> {
        let body = response.text().await.map_err(|e| {
            DemoError::remote_api(format!("unable to {}: failed to read response", operation))
                .with_source(e)
        })?;
        serde_json::from_str(&body).map_err(|e| {
            DemoError::remote_api(format!("unable to {}: invalid event in response", operation))
                .with_source(e)
        })
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, DemoResult<CalendarEvent>> {
        Box::pin(async move {
            let url = self.events_url(calendar_id);
            debug!("POST {}", url);
            let response = self
                .send(self.http_client.post(&url).json(event), "create event")
                .await?;
            Self::read_event(response, "create event").await
        })
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
        event: &'a CalendarEvent,
    ) -> BoxFuture<'a, DemoResult<CalendarEvent>> {
        Box::pin(async move {
            let url = self.event_url(calendar_id, event_id);
            debug!("PUT {}", url);
            let response = self
                .send(self.http_client.put(&url).json(event), "update event")
                .await?;
            Self::read_event(response, "update event").await
        })
    }

    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, DemoResult<CalendarEvent>> {
        Box::pin(async move {
            let url = self.event_url(calendar_id, event_id);
            debug!("GET {}", url);
            let response = self
                .send(self.http_client.get(&url), "retrieve event")
                .await?;
            Self::read_event(response, "retrieve event").await
        })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, DemoResult<()>> {
        Box::pin(async move {
            let url = self.event_url(calendar_id, event_id);
            debug!("DELETE {}", url);
            self.send(self.http_client.delete(&url), "delete event")
                .await?;
            Ok(())
        })
    }
}
