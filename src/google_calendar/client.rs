use super::auth::authorize;
use super::models::{CalendarEvent, EventsPage};
use super::token::StoredToken;
use crate::config::CalendarConfig;
use crate::error::{config_error, invalid_event_error, remote_service_error, CalendarResult};
use crate::utils::time::{add_days, date_to_offset_datetime, to_wire_utc};
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info};
use url::Url;

/// Google Calendar client authenticated with a single OAuth token
pub struct GoogleCalendar {
    config: CalendarConfig,
    token: StoredToken,
    client: Client,
}

impl GoogleCalendar {
    /// Authenticate (cached token, refresh or interactive flow) and build a client
    pub async fn connect(config: CalendarConfig) -> CalendarResult<Self> {
        config.validate()?;
        let token = authorize(&config).await?;
        info!("Google Calendar client ready");
        Ok(Self::with_token(config, token))
    }

    /// Build a client from an already obtained token
    pub fn with_token(config: CalendarConfig, token: StoredToken) -> Self {
        Self {
            config,
            token,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn token(&self) -> &StoredToken {
        &self.token
    }

    /// List single event instances starting in `[from, to)`, ordered by start time
    pub async fn list_events(
        &self,
        calendar_id: &str,
        from: &DateTime<FixedOffset>,
        to: &DateTime<FixedOffset>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let time_min = to_wire_utc(from)?;
        let time_max = to_wire_utc(to)?;
        let url = self.events_url(calendar_id, None)?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token.access_token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = send(request, "fetch events").await?;
            let page: EventsPage = response
                .json()
                .await
                .map_err(|e| remote_service_error(&format!("Failed to parse events response: {}", e)))?;

            events.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(
            "Fetched {} events from {} between {} and {}",
            events.len(),
            calendar_id,
            time_min,
            time_max
        );
        Ok(events)
    }

    /// List events from midnight of `from_date` up to the end of `to_date`
    /// (defaults to `from_date`), with days delimited at `offset`
    pub async fn list_events_by_date(
        &self,
        calendar_id: &str,
        from_date: NaiveDate,
        to_date: Option<NaiveDate>,
        offset: i32,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let (from, to) = date_range(from_date, to_date, offset)?;
        self.list_events(calendar_id, &from, &to).await
    }

    /// Insert an event, returning it as stored by the service
    pub async fn create_event(&self, calendar_id: &str, event: &CalendarEvent) -> CalendarResult<CalendarEvent> {
        let url = self.events_url(calendar_id, None)?;
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.token.access_token)
            .json(event);

        let response = send(request, "create event").await?;
        let created: CalendarEvent = response
            .json()
            .await
            .map_err(|e| remote_service_error(&format!("Failed to parse created event: {}", e)))?;

        debug!("Created event {:?} in {}", created.event_id(), calendar_id);
        Ok(created)
    }

    /// Insert events one after another; the first failure stops the batch
    /// and events created before it remain
    pub async fn create_events(&self, calendar_id: &str, events: &[CalendarEvent]) -> CalendarResult<Vec<CalendarEvent>> {
        let mut created = Vec::with_capacity(events.len());
        for event in events {
            created.push(self.create_event(calendar_id, event).await?);
        }
        info!("Created {} events in {}", created.len(), calendar_id);
        Ok(created)
    }

    pub async fn delete_event(&self, calendar_id: &str, event: &CalendarEvent) -> CalendarResult<()> {
        let event_id = event
            .event_id()
            .ok_or_else(|| invalid_event_error("Cannot delete an event without an id"))?;
        let url = self.events_url(calendar_id, Some(event_id))?;
        let request = self.client.delete(url).bearer_auth(&self.token.access_token);

        send(request, "delete event").await?;
        debug!("Deleted event {} from {}", event_id, calendar_id);
        Ok(())
    }

    /// Delete events one after another; the first failure stops the batch
    pub async fn delete_events(&self, calendar_id: &str, events: &[CalendarEvent]) -> CalendarResult<()> {
        for event in events {
            self.delete_event(calendar_id, event).await?;
        }
        info!("Deleted {} events from {}", events.len(), calendar_id);
        Ok(())
    }

    /// Delete every event listed for the date range; returns how many were deleted
    pub async fn delete_events_by_date(
        &self,
        calendar_id: &str,
        from_date: NaiveDate,
        to_date: Option<NaiveDate>,
        offset: i32,
    ) -> CalendarResult<usize> {
        let events = self
            .list_events_by_date(calendar_id, from_date, to_date, offset)
            .await?;
        self.delete_events(calendar_id, &events).await?;
        Ok(events.len())
    }

    /// `{base}/calendars/{calendar_id}/events[/{event_id}]` with each segment escaped
    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> CalendarResult<Url> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| config_error(&format!("Invalid api_base_url: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| config_error("api_base_url cannot be used as a base URL"))?;
            segments
                .pop_if_empty()
                .extend(["calendars", calendar_id, "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }
}

/// Half-open instant range covering whole days `from_date..=to_date` at `offset`
pub fn date_range(
    from_date: NaiveDate,
    to_date: Option<NaiveDate>,
    offset: i32,
) -> CalendarResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let to_date = to_date.unwrap_or(from_date);
    let from = date_to_offset_datetime(from_date, offset)?;
    let to = date_to_offset_datetime(add_days(to_date, 1)?, offset)?;
    Ok((from, to))
}

async fn send(request: RequestBuilder, action: &str) -> CalendarResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| remote_service_error(&format!("Failed to {}: {}", action, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(remote_service_error(&format!(
            "Failed to {}: HTTP {} - {}",
            action, status, error_body
        )));
    }

    Ok(response)
}
