//! Trigger endpoints for the calculation pipeline.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/run_calculation` | Run one calculation pass now |
//! | `POST` | `/aggregated_data?date=` | Daily cost sums per package type |
//!
//! A client that disconnects mid-run drops the handler future. A run that
//! already started writing costs still finishes its log append.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::ApiError;
use crate::state::AppState;

/// Message returned by every successful calculation trigger.
pub const CALCULATION_COMPLETE: &str = "Calculation is complete.";

/// Query parameters for `POST /aggregated_data`.
#[derive(Debug, serde::Deserialize)]
pub struct AggregatedQuery {
    /// `YYYY-MM-DD`, or an ISO-8601 date-time whose date part is used.
    pub date: String,
}

/// Run the delivery-cost calculation synchronously.
///
/// Responds with the acknowledgment message whether or not any package was
/// costed; the attached report carries the outcome.
pub async fn run_calculation(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.calculator.run().await?;
    Ok(Json(serde_json::json!({
        "message": CALCULATION_COMPLETE,
        "report": report,
    })))
}

/// Return the per-type delivery cost sums for one UTC day.
pub async fn aggregated_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregatedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date(&params.date)?;
    let rows = state.services.reporter.aggregated(date).await?;
    Ok(Json(rows))
}

/// Parse `YYYY-MM-DD`, an RFC 3339 date-time, or a naive ISO date-time.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] if none of the formats match.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.date())
        .map_err(|e| ApiError::BadRequest(format!("invalid date `{raw}`: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn may_3() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()
    }

    #[test]
    fn accepts_plain_and_datetime_forms() {
        assert_eq!(parse_date("2024-05-03").unwrap(), may_3());
        assert_eq!(parse_date("2024-05-03T10:15:00Z").unwrap(), may_3());
        assert_eq!(parse_date("2024-05-03T10:15:00+03:00").unwrap(), may_3());
        assert_eq!(parse_date("2024-05-03T10:15:00.123").unwrap(), may_3());
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "yesterday", "2024-13-01", "03.05.2024"] {
            assert!(matches!(parse_date(raw), Err(ApiError::BadRequest(_))));
        }
    }
}
