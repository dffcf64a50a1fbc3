//! Date/time conversion helpers and a Google Calendar client.
//!
//! - [`utils::time`]: conversions between timestamps, naive datetime strings,
//!   offset-aware datetimes and calendar dates
//! - [`google_calendar`]: list, create and delete events with a cached OAuth token
//! - [`config`]: explicit client configuration
//! - [`error`]: error types

pub mod config;
pub mod error;
pub mod google_calendar;
pub mod utils;

pub use config::CalendarConfig;
pub use error::{CalendarResult, Error};
pub use google_calendar::{CalendarEvent, EventTime, GoogleCalendar};
pub use utils::time::Locality;
