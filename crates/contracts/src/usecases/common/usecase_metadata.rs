/// Метаданные UseCase для /info и логов
pub trait UseCaseMetadata {
    /// Индекс UseCase (например, "u601")
    fn usecase_index() -> &'static str;

    /// Техническое имя (например, "load_tenders")
    fn usecase_name() -> &'static str;

    /// Отображаемое имя (например, "Загрузка тендеров")
    fn display_name() -> &'static str;

    fn description() -> &'static str {
        ""
    }

    /// Полное имя вида "u601_load_tenders"
    fn full_name() -> String {
        format!("{}_{}", Self::usecase_index(), Self::usecase_name())
    }
}
