//! `POST /api/competitors`: web results for a product keyword.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::SharedState;
use crate::tools::WebResult;

const COMPETITOR_RESULTS: u32 = 5;
const MISSING_KEYWORD: &str = "Missing 'keyword' in request body.";

#[derive(Debug, Deserialize)]
struct CompetitorsRequest {
    #[serde(default)]
    keyword: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompetitorsResponse {
    pub keyword: String,
    pub results: Vec<WebResult>,
}

pub async fn competitors(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<CompetitorsResponse>, ApiError> {
    state.web_search.check_ready().map_err(ApiError::from_search)?;

    let request: CompetitorsRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::Internal {
            error: "Failed to search competitors".to_string(),
            details: e.to_string(),
        })?;

    let keyword = request.keyword.unwrap_or_default().trim().to_string();
    if keyword.is_empty() {
        return Err(ApiError::validation(MISSING_KEYWORD));
    }

    tracing::info!(%keyword, "competitor search");
    let results = state
        .web_search
        .search(&keyword, COMPETITOR_RESULTS)
        .await
        .map_err(ApiError::from_search)?;

    Ok(Json(CompetitorsResponse { keyword, results }))
}
