use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::services::analyzer::EntryAnalysis;

/// Journal entry row. The body is stored encrypted: ciphertext, nonce and
/// auth tag are hex strings written together or not at all.
#[derive(Debug, Clone, FromRow)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ciphertext: String,
    pub nonce: String,
    pub auth_tag: String,
    pub analysis: Option<sqlx::types::Json<EntryAnalysis>>,
    pub created_at: DateTime<Utc>,
}

/// Decrypted entry as returned to the client.
#[derive(Debug, Serialize)]
pub struct JournalEntryView {
    pub id: Uuid,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<EntryAnalysis>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn into_view(self, content: String) -> JournalEntryView {
        JournalEntryView {
            id: self.id,
            content,
            analysis: self.analysis.map(|json| json.0),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJournalRequest {
    #[validate(length(min = 1, max = 20000, message = "Content must be 1-20000 characters"))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct StreakResponse {
    pub streak: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_entry_date: Option<chrono::NaiveDate>,
}
