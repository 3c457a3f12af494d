//! Outbound text-completion client.
//!
//! Everything the app wants from the model is "prompt in, free text out";
//! the narrow trait keeps the parsing and normalization logic (the part
//! that actually matters) testable against canned strings.

use async_trait::async_trait;

use crate::config::Config;

#[async_trait]
pub trait TextCompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, anyhow::Error>;
}

/// Gemini `generateContent` REST client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, anyhow::Error> {
        // Bounded timeout so a wedged upstream degrades to the documented
        // fallbacks instead of hanging the request.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
        })
    }
}

#[async_trait]
impl TextCompletionService for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, anyhow::Error> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1/models/{}:generateContent",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {}: {}", status, body);
        }

        let body: serde_json::Value = response.json().await?;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Gemini response missing text part"))?;

        Ok(text.to_string())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Canned-response fake for analyzer/summary/chat tests.
    pub struct FakeCompletion {
        pub response: Result<String, String>,
    }

    impl FakeCompletion {
        pub fn returning(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl TextCompletionService for FakeCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, anyhow::Error> {
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow::anyhow!("{message}")),
            }
        }
    }
}
