use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::Value;
use thiserror::Error;

use super::placing_way::placing_way_label;
use super::tenderplan_api_client::{Attachment, TenderRecord};
use crate::shared::config::TransformConfig;
use crate::shared::format::{format_display, format_epoch_ms};

/// Фиксированные колонки строки, в порядке вывода
pub const FIXED_COLUMNS: [&str; 9] = [
    "Дата загрузки",
    "ID",
    "Название",
    "Заказчики",
    "Начальная цена",
    "Ссылка",
    "Дата публикации",
    "Окончание подачи",
    "Способ размещения",
];

/// Заголовок для `attachment_pairs` пар (название, ссылка)
pub fn header(attachment_pairs: usize) -> Vec<String> {
    let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for n in 1..=attachment_pairs {
        columns.push(format!("Вложение {}", n));
        columns.push(format!("Ссылка на вложение {}", n));
    }
    columns
}

/// Строка таблицы: фиксированные колонки и пары вложений
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadsheetRow {
    pub cells: Vec<Value>,
    pub attachment_count: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("tender has no identifier")]
    MissingId,
}

pub struct RowTransformer {
    tz: Tz,
    name_max_chars: usize,
    unknown_label: String,
    url_template: String,
}

impl RowTransformer {
    pub fn new(config: &TransformConfig, tz: Tz, url_template: &str) -> Self {
        Self {
            tz,
            name_max_chars: config.name_max_chars,
            unknown_label: config.unknown_placing_way_label.clone(),
            url_template: url_template.to_string(),
        }
    }

    pub fn transform(
        &self,
        run_timestamp: &str,
        record: &TenderRecord,
        attachments: &[Attachment],
    ) -> Result<SpreadsheetRow, TransformError> {
        let id = record.id().ok_or(TransformError::MissingId)?;
        let url = record
            .url()
            .unwrap_or_else(|| self.url_template.replace("{id}", &id));

        let mut cells = vec![
            Value::from(run_timestamp),
            Value::from(id),
            Value::from(truncate_chars(&record.name(), self.name_max_chars)),
            Value::from(record.customer_names().join(", ")),
            price_cell(record.max_price()),
            Value::from(url),
            Value::from(format_timestamp(record.publication_time(), self.tz)),
            Value::from(format_timestamp(record.submission_close_time(), self.tz)),
            Value::from(placing_way_label(record.placing_way(), &self.unknown_label)),
        ];
        for attachment in attachments {
            cells.push(Value::from(attachment.display_name.as_str()));
            cells.push(Value::from(attachment.href.as_str()));
        }

        Ok(SpreadsheetRow {
            cells,
            attachment_count: attachments.len(),
        })
    }
}

/// Обрезка по символам; 0 отключает обрезку
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

fn price_cell(price: Value) -> Value {
    match price {
        Value::Number(_) => price,
        Value::String(s) => Value::String(s),
        _ => Value::from(""),
    }
}

/// Время в формате `DD.MM.YYYY HH:MM` в зоне `tz`
///
/// Принимает миллисекунды (числом или строкой) и RFC 3339. Пустое значение
/// и 0 дают пустую строку; нераспознанное значение тоже, с предупреждением.
pub fn format_timestamp(value: Option<&Value>, tz: Tz) -> String {
    let formatted = match value {
        None | Some(Value::Null) => return String::new(),
        Some(Value::Number(n)) => match n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)) {
            Some(0) => return String::new(),
            Some(ms) => format_epoch_ms(ms, tz),
            None => None,
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return String::new();
            }
            match s.parse::<i64>() {
                Ok(0) => return String::new(),
                Ok(ms) => format_epoch_ms(ms, tz),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| format_display(&dt.with_timezone(&tz))),
            }
        }
        Some(_) => None,
    };

    formatted.unwrap_or_else(|| {
        tracing::warn!("Unrecognized timestamp value: {:?}", value);
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transformer() -> RowTransformer {
        RowTransformer::new(
            &TransformConfig::default(),
            chrono_tz::Asia::Novosibirsk,
            "https://tenderplan.ru/app?tender={id}",
        )
    }

    #[test]
    fn test_full_row() {
        let record = TenderRecord(json!({
            "_id": "693812",
            "orderName": "Поставка бумаги",
            "customers": [{"name": "МБОУ СОШ 1"}, {"name": "МБОУ СОШ 2"}],
            "maxPrice": 125000,
            "placingWay": 15,
            "publicationDateTime": 1765276200000i64,
            "submissionCloseDateTime": null
        }));
        let attachments = vec![Attachment {
            display_name: "ТЗ.docx".to_string(),
            href: "https://files/tz".to_string(),
        }];

        let row = transformer()
            .transform("10.12.2025 09:00", &record, &attachments)
            .unwrap();
        assert_eq!(
            row.cells,
            vec![
                json!("10.12.2025 09:00"),
                json!("693812"),
                json!("Поставка бумаги"),
                json!("МБОУ СОШ 1, МБОУ СОШ 2"),
                json!(125000),
                json!("https://tenderplan.ru/app?tender=693812"),
                json!("09.12.2025 17:30"),
                json!(""),
                json!("Электронный аукцион"),
                json!("ТЗ.docx"),
                json!("https://files/tz"),
            ]
        );
        assert_eq!(row.attachment_count, 1);
        assert_eq!(row.cells.len(), header(1).len());
    }

    #[test]
    fn test_unknown_placing_way_and_empty_customers() {
        let record = TenderRecord(json!({"_id": "1", "placingWay": 777, "customers": []}));
        let row = transformer().transform("", &record, &[]).unwrap();
        assert_eq!(row.cells[3], json!(""));
        assert_eq!(row.cells[8], json!("Неизвестно"));
        assert_eq!(row.cells.len(), FIXED_COLUMNS.len());
    }

    #[test]
    fn test_missing_id_is_error() {
        let record = TenderRecord(json!({"orderName": "без номера"}));
        assert_eq!(
            transformer().transform("", &record, &[]).unwrap_err(),
            TransformError::MissingId
        );
    }

    #[test]
    fn test_name_truncated_by_chars() {
        let long = "я".repeat(150);
        assert_eq!(truncate_chars(&long, 100).chars().count(), 100);
        assert_eq!(truncate_chars(&long, 0), long);
    }

    #[test]
    fn test_timestamp_variants() {
        let tz = chrono_tz::Asia::Novosibirsk;
        assert_eq!(format_timestamp(None, tz), "");
        assert_eq!(format_timestamp(Some(&json!(0)), tz), "");
        assert_eq!(format_timestamp(Some(&json!("1765276200000")), tz), "09.12.2025 17:30");
        assert_eq!(format_timestamp(Some(&json!("2025-12-09T10:30:00Z")), tz), "09.12.2025 17:30");
        assert_eq!(format_timestamp(Some(&json!("вчера")), tz), "");
        assert_eq!(format_timestamp(Some(&json!(i64::MAX)), tz), "");
    }

    #[test]
    fn test_header_width() {
        assert_eq!(header(0).len(), 9);
        assert_eq!(header(3).len(), 15);
        assert_eq!(header(2)[11], "Вложение 2");
    }
}
