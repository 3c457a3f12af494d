use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000, message = "Message is required"))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

fn build_prompt(message: &str) -> String {
    format!(
        r#"You are Mindlog, a kind and empathetic journal companion.
Help users reflect on their thoughts safely and positively.
Be calm, supportive, and encouraging, like a gentle friend.
Keep responses short unless the user asks for more depth.
Never give medical or diagnostic advice. Focus on reflection, gratitude, and hope.

User message:
{}"#,
        message.trim()
    )
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let reply = state
        .llm
        .complete(&build_prompt(&body.message))
        .await
        .map_err(AppError::ChatFailed)?;

    Ok(Json(ChatResponse { reply }))
}
