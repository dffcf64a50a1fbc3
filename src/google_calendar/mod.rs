//! Thin client over the Google Calendar v3 REST API.
//!
//! [`GoogleCalendar::connect`] authenticates once (cached token, refresh, or
//! the interactive installed-app flow) and then lists, creates and deletes
//! events. Batch operations run sequentially and stop at the first error.

mod auth;
mod client;
pub mod models;
pub mod token;

pub use auth::{authorize, InstalledAppFlow};
pub use client::{date_range, GoogleCalendar};
pub use models::{CalendarEvent, EventTime};
pub use token::{ClientSecret, StoredToken, TokenManager, TokenStore};
