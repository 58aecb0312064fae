use axum::{extract::State, Json};

use crate::error::{AppError, Result};
use crate::relay::{DispatchError, ServerEvent};
use crate::server::AppState;

use super::models::{EmitRequest, EmitResponse};

/// Deliver an event to every live connection of the given user.
#[tracing::instrument(
    name = "gateway.emit",
    skip(state, request),
    fields(user_id = %request.user_id, event = %request.event)
)]
pub async fn emit_event(
    State(state): State<AppState>,
    Json(request): Json<EmitRequest>,
) -> Result<Json<EmitResponse>> {
    let event = ServerEvent::push(request.event, request.data);

    match state
        .dispatcher
        .send_to_identity(&request.user_id, event)
        .await
    {
        Ok(report) => Ok(Json(EmitResponse {
            status: "ok",
            sent: report.attempted,
        })),
        Err(DispatchError::NoRecipients) => {
            Err(AppError::NotFound("User not found".to_string()))
        }
    }
}
