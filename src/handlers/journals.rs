use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::journal::{
    CreateJournalRequest, JournalEntry, JournalEntryView, StreakResponse, SummaryResponse,
};
use crate::services::{analyzer, summary};
use crate::streak::{self, StreakState};
use crate::AppState;

pub async fn create_journal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateJournalRequest>,
) -> AppResult<(StatusCode, Json<JournalEntryView>)> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let encrypted = state.cipher.encrypt(&body.content)?;

    // Best-effort: a failed analysis becomes the neutral fallback record and
    // never blocks the write.
    let analysis = analyzer::analyze(state.llm.as_ref(), &body.content).await;

    // Serialize streak read-modify-write per user.
    let lock = state.streak_locks.for_user(auth_user.id).await;
    let _guard = lock.lock().await;

    let entry = sqlx::query_as::<_, JournalEntry>(
        r#"
        INSERT INTO journal_entries (id, user_id, ciphertext, nonce, auth_tag, analysis)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&encrypted.ciphertext)
    .bind(&encrypted.nonce)
    .bind(&encrypted.tag)
    .bind(sqlx::types::Json(&analysis))
    .fetch_one(&state.db)
    .await?;

    // Key the streak on the inserted row's own timestamp: that is what the
    // delete path reads back, so app/DB clock skew cannot split the two.
    let day = streak::entry_day(entry.created_at);
    let current = load_streak(&state, auth_user.id).await?;
    save_streak(&state, auth_user.id, current.record_day(day)).await?;

    Ok((StatusCode::CREATED, Json(entry.into_view(body.content))))
}

pub async fn list_journals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<JournalEntryView>>> {
    let entries = sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT * FROM journal_entries
        WHERE user_id = $1
        ORDER BY created_at DESC, id
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let mut views = Vec::with_capacity(entries.len());
    for entry in entries {
        let content = state
            .cipher
            .decrypt(&entry.ciphertext, &entry.nonce, &entry.auth_tag)?;
        views.push(entry.into_view(content));
    }

    Ok(Json(views))
}

pub async fn delete_journal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let lock = state.streak_locks.for_user(auth_user.id).await;
    let _guard = lock.lock().await;

    // Owner-checked, idempotent: already-gone returns 200 like any delete.
    let deleted = sqlx::query(
        "DELETE FROM journal_entries WHERE id = $1 AND user_id = $2",
    )
    .bind(entry_id)
    .bind(auth_user.id)
    .execute(&state.db)
    .await?;

    if deleted.rows_affected() > 0 {
        // Deleting an arbitrary entry may or may not have been the one
        // extending the streak; recompute from the surviving days.
        let days = sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT DISTINCT (created_at AT TIME ZONE 'UTC')::date AS day
            FROM journal_entries
            WHERE user_id = $1
            ORDER BY day ASC
            "#,
        )
        .bind(auth_user.id)
        .fetch_all(&state.db)
        .await?;

        save_streak(&state, auth_user.id, streak::recompute(&days)).await?;
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Aggregates the most recent entries into the normalized three-section
/// emotional summary.
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<SummaryResponse>> {
    let entries = sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT * FROM journal_entries
        WHERE user_id = $1
        ORDER BY created_at DESC, id
        LIMIT $2
        "#,
    )
    .bind(auth_user.id)
    .bind(state.config.summary_window)
    .fetch_all(&state.db)
    .await?;

    if entries.is_empty() {
        return Err(AppError::NotFound("No journals found for analysis.".into()));
    }

    // Oldest first so the narrative reads chronologically.
    let mut contents = Vec::with_capacity(entries.len());
    for entry in entries.into_iter().rev() {
        contents.push(
            state
                .cipher
                .decrypt(&entry.ciphertext, &entry.nonce, &entry.auth_tag)?,
        );
    }

    let prompt = summary::build_prompt(&contents);
    let raw = state
        .llm
        .complete(&prompt)
        .await
        .map_err(AppError::SummaryFailed)?;

    // Normalization always structurally succeeds, whatever came back.
    let normalized = summary::normalize(&raw);

    Ok(Json(SummaryResponse {
        summary: normalized.to_text(),
    }))
}

pub async fn get_streak(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<StreakResponse>> {
    let current = load_streak(&state, auth_user.id).await?;
    Ok(Json(StreakResponse {
        streak: current.streak,
        last_entry_date: current.last_entry_date,
    }))
}

async fn load_streak(state: &AppState, user_id: Uuid) -> AppResult<StreakState> {
    let row = sqlx::query_as::<_, (i32, Option<NaiveDate>)>(
        "SELECT streak, last_entry_date FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("User not found".into()))?;

    Ok(StreakState {
        streak: row.0,
        last_entry_date: row.1,
    })
}

async fn save_streak(state: &AppState, user_id: Uuid, streak: StreakState) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE users SET
            streak = $2,
            last_entry_date = $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(streak.streak)
    .bind(streak.last_entry_date)
    .execute(&state.db)
    .await?;
    Ok(())
}
