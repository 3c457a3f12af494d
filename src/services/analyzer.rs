//! Best-effort emotional analysis of a single entry.
//!
//! The model is asked for pure JSON but routinely wraps it in markdown
//! fences or commentary, so the parser extracts the first balanced `{...}`
//! substring instead of trusting the whole response. Every failure mode
//! collapses to a neutral fallback record; analysis never blocks a write.

use serde::{Deserialize, Serialize};

use crate::services::llm::TextCompletionService;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryAnalysis {
    pub sentiment: Sentiment,
    pub emotions: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl EntryAnalysis {
    pub fn fallback() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            emotions: vec![],
            suggestions: vec!["Could not analyze due to an error.".into()],
        }
    }
}

fn build_prompt(content: &str) -> String {
    format!(
        r#"You are an emotion analysis assistant.
Analyze the following journal entry and respond with ONLY a valid JSON object like this:

{{
  "sentiment": "positive" | "negative" | "neutral",
  "emotions": ["emotion1", "emotion2"],
  "suggestions": ["tip1", "tip2"]
}}

Do NOT add any explanation, markdown, or extra text. Only return pure JSON.

Journal Entry:
"{}""#,
        content.trim()
    )
}

/// Returns the first balanced `{...}` substring, tracking strings and
/// escapes so braces inside values do not break the count.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_analysis(raw: &str) -> Option<EntryAnalysis> {
    let object = first_json_object(raw)?;
    serde_json::from_str(object).ok()
}

/// Analyzes one decrypted entry. Infallible by contract: transport errors,
/// unparseable output and missing fields all yield the fallback record.
pub async fn analyze(llm: &dyn TextCompletionService, content: &str) -> EntryAnalysis {
    let prompt = build_prompt(content);

    match llm.complete(&prompt).await {
        Ok(raw) => parse_analysis(&raw).unwrap_or_else(|| {
            tracing::warn!("Analysis response contained no parseable JSON object");
            EntryAnalysis::fallback()
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Entry analysis call failed, using fallback");
            EntryAnalysis::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::testing::FakeCompletion;

    #[tokio::test]
    async fn parses_clean_json() {
        let llm = FakeCompletion::returning(
            r#"{"sentiment": "positive", "emotions": ["joy", "calm"], "suggestions": ["Keep a gratitude list"]}"#,
        );
        let analysis = analyze(&llm, "Had a lovely walk.").await;
        assert_eq!(analysis.sentiment, Sentiment::Positive);
        assert_eq!(analysis.emotions, vec!["joy", "calm"]);
        assert_eq!(analysis.suggestions, vec!["Keep a gratitude list"]);
    }

    #[tokio::test]
    async fn extracts_object_from_surrounding_prose() {
        let llm = FakeCompletion::returning(
            "Sure! Here is the analysis you asked for:\n```json\n{\"sentiment\": \"negative\", \"emotions\": [\"stress\"], \"suggestions\": []}\n```\nHope that helps!",
        );
        let analysis = analyze(&llm, "Rough day.").await;
        assert_eq!(analysis.sentiment, Sentiment::Negative);
        assert_eq!(analysis.emotions, vec!["stress"]);
    }

    #[tokio::test]
    async fn braces_inside_strings_do_not_confuse_the_scanner() {
        let llm = FakeCompletion::returning(
            r#"{"sentiment": "neutral", "emotions": ["curiosity {sort of}"], "suggestions": ["try \"box\" breathing"]}"#,
        );
        let analysis = analyze(&llm, "x").await;
        assert_eq!(analysis.emotions, vec!["curiosity {sort of}"]);
        assert_eq!(analysis.suggestions, vec!["try \"box\" breathing"]);
    }

    #[tokio::test]
    async fn transport_failure_yields_exact_fallback() {
        let llm = FakeCompletion::failing("connection refused");
        let analysis = analyze(&llm, "anything").await;
        assert_eq!(analysis, EntryAnalysis::fallback());
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert!(analysis.emotions.is_empty());
        assert_eq!(
            analysis.suggestions,
            vec!["Could not analyze due to an error."]
        );
    }

    #[tokio::test]
    async fn garbage_response_yields_fallback() {
        for garbage in ["", "no json here", "{\"sentiment\": \"confused\"}", "{broken"] {
            let llm = FakeCompletion::returning(garbage);
            assert_eq!(analyze(&llm, "x").await, EntryAnalysis::fallback());
        }
    }

    #[test]
    fn first_object_is_taken_when_several_exist() {
        let raw = r#"{"a": 1} {"b": 2}"#;
        assert_eq!(first_json_object(raw), Some(r#"{"a": 1}"#));
    }
}
