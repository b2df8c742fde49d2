use serde::{Deserialize, Serialize};

/// GET /check-time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckTimeResponse {
    pub status: String,
    pub timezone: String,
    pub publication_timezone: String,
    pub api_time_basis: String,
    pub current_time: CurrentTime,
    pub target_date: TargetDate,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentTime {
    pub system: String,
    pub utc: String,
    pub local: String,
    pub publication: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDate {
    pub date: String,
    pub start: BoundaryTime,
    pub end: BoundaryTime,
}

/// Граница окна в трех представлениях и в миллисекундах запроса
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryTime {
    pub local: String,
    pub publication: String,
    pub utc: String,
    pub timestamp: i64,
}
