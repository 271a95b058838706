use axum::{debug_handler, Json};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

/// Liveness only.
#[debug_handler]
pub async fn health() -> Json<Health> {
    let now = OffsetDateTime::now_utc();
    Json(Health {
        status: "OK",
        timestamp: now
            .format(&Rfc3339)
            .unwrap_or_else(|_| now.unix_timestamp().to_string()),
    })
}
