use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

/// Формат дат в таблице и в ответах
pub const DISPLAY_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Форматирует число с разделителями тысяч (точками)
///
/// # Примеры
/// ```ignore
/// assert_eq!(format_number(1234567), "1.234.567");
/// assert_eq!(format_number(42), "42");
/// ```
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push('.');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// `dd.mm.yyyy HH:MM` в зоне `tz`; `None` для значений вне диапазона chrono
pub fn format_epoch_ms(ms: i64, tz: Tz) -> Option<String> {
    tz.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
}

pub fn format_display<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    dt.format(DISPLAY_FORMAT).to_string()
}
