use dotenvy::dotenv;
use google_calendar_utils::config::CalendarConfig;
use google_calendar_utils::error::{config_error, CalendarResult, Error};
use google_calendar_utils::google_calendar::GoogleCalendar;
use google_calendar_utils::utils::time::{day_of_week, now, offset_datetime_to_local_string};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Resolve the client configuration from the environment
fn load_config() -> CalendarResult<CalendarConfig> {
    // Load .env file if it exists
    dotenv().ok();

    if let Ok(path) = env::var("GOOGLE_CALENDAR_CONFIG") {
        return CalendarConfig::from_file(path);
    }

    let data_home = match env::var("XDG_DATA_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = env::var("HOME").map_err(|_| config_error("Missing environment variable: HOME"))?;
            PathBuf::from(home).join(".local").join("share")
        }
    };
    let base = data_home.join("google-calendar");

    let client_secret_path = env::var("GOOGLE_CALENDAR_CREDENTIALS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| base.join("credentials.json"));
    let token_path = env::var("GOOGLE_CALENDAR_TOKEN")
        .map(PathBuf::from)
        .unwrap_or_else(|_| base.join("token.json"));

    Ok(CalendarConfig::new(client_secret_path, token_path))
}

fn timezone_offset() -> CalendarResult<i32> {
    match env::var("TIMEZONE_OFFSET") {
        Ok(value) => value
            .trim()
            .parse::<i32>()
            .map_err(|_| config_error(&format!("Invalid TIMEZONE_OFFSET '{}'", value))),
        Err(_) => Ok(0),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_logging()?;

    let config = load_config()?;
    let token_path = config.token_path.clone();

    // Reuses a cached token when possible, otherwise opens the browser
    let calendar = GoogleCalendar::connect(config).await?;
    println!("Token available at {}", token_path.display());

    // Print today's agenda when a calendar is given
    if let Ok(calendar_id) = env::var("GOOGLE_CALENDAR_ID") {
        let offset = timezone_offset()?;
        let today = now(offset)?.date_naive();
        info!("Listing events for {} in {}", today, calendar_id);

        let events = calendar
            .list_events_by_date(&calendar_id, today, None, offset)
            .await?;

        println!("{} ({})", today, day_of_week(today));
        for event in &events {
            let start = offset_datetime_to_local_string(&event.event_start_instant()?, Some(offset))?;
            println!("  {}  {}", start, event.event_title().unwrap_or("(no title)"));
        }
        if events.is_empty() {
            println!("  no events");
        }
    }

    Ok(())
}
