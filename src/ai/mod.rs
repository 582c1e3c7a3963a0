//! Generative-AI forecast: prompt, Gemini client, and response parsing.
//!
//! The model receives the prompt plus the exported history CSV and is asked
//! for a `date,value` CSV covering the horizon. The reply is free text, so
//! parsing lives in its own module and is strict: anything that is not a
//! header plus `date,value` rows fails the run.

pub mod parse;
pub mod prompt;

pub use parse::parse_ai_forecast;
pub use prompt::{PromptContext, build_prompt};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn from_env(model: &str) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AppError::new(2, "Missing GEMINI_API_KEY in environment (.env)."))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the prompt and the attachment text, return the reply text.
    pub fn generate(&self, prompt: &str, attachment: &str) -> Result<String, AppError> {
        let url = format!("{BASE_URL}/{}:generateContent", self.model);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompt), Part::text(attachment)],
            }],
        };
        debug!(model = %self.model, prompt_chars = prompt.len(), attachment_chars = attachment.len(), "calling generative model");

        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .map_err(|e| AppError::new(4, format!("AI request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("AI request failed with status {}.", resp.status()),
            ));
        }

        let body: GenerateResponse = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse AI response: {e}")))?;
        let text = body.text()?;
        info!(model = %self.model, chars = text.len(), "AI response received");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl Part {
    fn text(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Result<String, AppError> {
        let content = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .ok_or_else(|| AppError::new(4, "AI response has no candidates."))?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            return Err(AppError::new(4, "AI response is empty."));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sends_prompt_and_attachment_as_parts() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part::text("forecast please"), Part::text("date,selic\n")],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "forecast please");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "date,selic\n");
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"date,value\n"},{"text":"2024-07-01,10.5\n"}]}}]}"#;
        let resp: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text().unwrap(), "date,value\n2024-07-01,10.5\n");

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(empty.text().unwrap_err().exit_code(), 4);
    }
}
