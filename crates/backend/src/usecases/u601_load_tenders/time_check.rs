use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use contracts::usecases::u601_load_tenders::time_check::{
    BoundaryTime, CheckTimeResponse, CurrentTime, TargetDate,
};

use crate::shared::config::TimezoneConfig;
use crate::shared::error::LoaderError;
use crate::shared::format::format_display;
use crate::shared::time_window::{compute_window_for, to_utc};

const SECONDS_FORMAT: &str = "%d.%m.%Y %H:%M:%S %Z";

fn boundary(local: &DateTime<Tz>, publication: &DateTime<Tz>, timestamp: i64) -> BoundaryTime {
    BoundaryTime {
        local: local.format(SECONDS_FORMAT).to_string(),
        publication: publication.format(SECONDS_FORMAT).to_string(),
        utc: to_utc(local).format(SECONDS_FORMAT).to_string(),
        timestamp,
    }
}

/// Диагностика часовых поясов для GET /check-time
pub fn check_time(now: DateTime<Utc>, zones: &TimezoneConfig) -> Result<CheckTimeResponse, LoaderError> {
    let local_tz = zones.local_tz()?;
    let publication_tz = zones.publication_tz()?;
    let window = compute_window_for(now, zones)?;

    let date = window.target_date.format("%d.%m.%Y").to_string();
    Ok(CheckTimeResponse {
        status: "ok".to_string(),
        timezone: zones.local.clone(),
        publication_timezone: zones.publication.clone(),
        api_time_basis: zones.api_time_basis.as_str().to_string(),
        current_time: CurrentTime {
            system: now.with_timezone(&Local).format(SECONDS_FORMAT).to_string(),
            utc: now.format(SECONDS_FORMAT).to_string(),
            local: now.with_timezone(&local_tz).format(SECONDS_FORMAT).to_string(),
            publication: now.with_timezone(&publication_tz).format(SECONDS_FORMAT).to_string(),
        },
        target_date: TargetDate {
            date: date.clone(),
            start: boundary(&window.start_local, &window.start_publication, window.from_ms),
            end: boundary(&window.end_local, &window.end_publication, window.query_to_ms()),
        },
        message: format!(
            "Загрузка возьмет тендеры за {} ({}), запуск {}",
            date,
            zones.local,
            format_display(&now.with_timezone(&local_tz))
        ),
    })
}
