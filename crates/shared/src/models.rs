use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One download attempt, built per request and discarded once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEvent {
    pub file_id: String,
    pub ip: String,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: i64,
    pub file_id: Option<String>,
    pub ip: Option<String>,
    pub cache_hit: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub hash: String,
    pub content_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub hash: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}
