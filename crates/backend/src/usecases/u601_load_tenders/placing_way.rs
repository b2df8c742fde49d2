use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Способы размещения закупки: код TenderPlan -> подпись
pub static PLACING_WAYS: Lazy<HashMap<i64, &'static str>> = Lazy::new(|| {
    maplit::hashmap! {
        3 => "Открытый аукцион (ЭФ)",
        12 => "Закрытый аукцион",
        15 => "Электронный аукцион",
        22 => "Запрос котировок ЭФ",
        23 => "Открытый конкурс ЭФ",
        24 => "Запрос предложений ЭФ",
        25 => "Конкурс с ограничением ЭФ",
        26 => "Двухэтапный ЭФ",
    }
});

/// Подпись способа размещения; для неизвестного или отсутствующего кода `fallback`
pub fn placing_way_label<'a>(code: Option<i64>, fallback: &'a str) -> &'a str {
    code.and_then(|c| PLACING_WAYS.get(&c).copied())
        .unwrap_or(fallback)
}
