//! Окно публикации: вчерашний календарный день в локальной зоне
//!
//! Цепочка преобразований разбита на чистые функции:
//! локальная полночь -> зона публикации -> UTC (или настенное время
//! публикатора, записанное как UTC), затем миллисекунды для запроса.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::shared::config::{ApiTimeBasis, TimezoneConfig};
use crate::shared::error::LoaderError;

/// Полуоткрытое окно `[from_ms, to_ms)` одного календарного дня
#[derive(Debug, Clone)]
pub struct DateWindow {
    pub target_date: NaiveDate,
    pub start_local: DateTime<Tz>,
    /// Полночь следующего дня (исключающая граница)
    pub end_local: DateTime<Tz>,
    pub start_publication: DateTime<Tz>,
    pub end_publication: DateTime<Tz>,
    pub from_ms: i64,
    pub to_ms: i64,
}

impl DateWindow {
    /// Включающая верхняя граница для API (23:59:59.999)
    pub fn query_to_ms(&self) -> i64 {
        self.to_ms - 1
    }
}

/// Вчерашняя дата в зоне `local`
pub fn target_date(now: DateTime<Utc>, local: Tz) -> NaiveDate {
    (now.with_timezone(&local) - Duration::days(1)).date_naive()
}

/// Начало суток `date` в зоне `tz`
///
/// Если полночь попадает в разрыв перехода на летнее время,
/// берется первый существующий момент после нее.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let mut naive = date.and_time(NaiveTime::MIN);
    for _ in 0..(4 * 24) {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => naive += Duration::minutes(15),
        }
    }
    tz.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Тот же момент времени в другой зоне
pub fn to_zone(dt: &DateTime<Tz>, zone: Tz) -> DateTime<Tz> {
    dt.with_timezone(&zone)
}

pub fn to_utc(dt: &DateTime<Tz>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// Настенное время `dt` в его зоне, записанное как UTC
pub fn wall_clock_as_utc(dt: &DateTime<Tz>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&dt.naive_local())
}

fn query_instant(dt: &DateTime<Tz>, publication: Tz, basis: ApiTimeBasis) -> DateTime<Utc> {
    let in_publication = to_zone(dt, publication);
    match basis {
        ApiTimeBasis::Utc => to_utc(&in_publication),
        ApiTimeBasis::PublisherWallClock => wall_clock_as_utc(&in_publication),
    }
}

/// Окно для вчерашнего дня относительно `now`
pub fn compute_window(now: DateTime<Utc>, local: Tz, publication: Tz, basis: ApiTimeBasis) -> DateWindow {
    let target = target_date(now, local);
    let next = target + Duration::days(1);

    let start_local = local_midnight(target, local);
    let end_local = local_midnight(next, local);

    DateWindow {
        target_date: target,
        start_publication: to_zone(&start_local, publication),
        end_publication: to_zone(&end_local, publication),
        from_ms: query_instant(&start_local, publication, basis).timestamp_millis(),
        to_ms: query_instant(&end_local, publication, basis).timestamp_millis(),
        start_local,
        end_local,
    }
}

/// То же по именам зон из конфигурации
pub fn compute_window_for(now: DateTime<Utc>, zones: &TimezoneConfig) -> Result<DateWindow, LoaderError> {
    Ok(compute_window(
        now,
        zones.local_tz()?,
        zones.publication_tz()?,
        zones.api_time_basis,
    ))
}
