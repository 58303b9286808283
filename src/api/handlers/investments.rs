use axum::extract::State;
use axum::Json;

use crate::api::user::UserId;
use crate::errors::AppError;
use crate::models::Investment;
use crate::AppState;

use super::ApiResponse;

/// GET /api/investments: the acting user's investment records
pub async fn list(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Json<ApiResponse<Vec<Investment>>>, AppError> {
    let investments = state.store.list_investments(user.as_str()).await?;
    Ok(Json(ApiResponse::ok(investments)))
}
