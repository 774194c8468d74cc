use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Un registro de auditoría por llamada al proveedor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiLogRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub params: Option<serde_json::Value>,
    pub response: Option<String>,
    pub success: bool,
    pub service: Option<String>,
    pub country: Option<String>,
    pub operator: Option<String>,
    pub activation_id: Option<String>,
}

impl ApiLogRecord {
    pub fn new(action: &str, timestamp: DateTime<Utc>) -> Self {
        ApiLogRecord {
            timestamp,
            action: action.to_string(),
            params: None,
            response: None,
            success: false,
            service: None,
            country: None,
            operator: None,
            activation_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiLogRow {
    pub id: i64,
    #[serde(flatten)]
    pub record: ApiLogRecord,
}

/// Filtros de `GET /api/logs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiLogFilter {
    pub action: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ApiLogFilter {
    pub const DEFAULT_LIMIT: i64 = 200;

    /// `all` (o vacío) significa sin filtro de acción.
    pub fn action_filter(&self) -> Option<&str> {
        self.action
            .as_deref()
            .filter(|action| !action.is_empty() && *action != "all")
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit.map(|l| l.max(1)).unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.map(|o| o.max(0)).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfigView {
    pub has_api_key: bool,
    pub api_key_hint: Option<String>,
    pub balance: Option<f64>,
    pub log_enabled: bool,
    pub last_updated: Option<DateTime<Utc>>,
}
