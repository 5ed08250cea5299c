//! CLOVA Studio API client.
//!
//! Wraps the HCX-003 chat-completion endpoint and the matching chat-tokenize
//! endpoint. Both require the two NCP API-key headers on every request.
//!
//! # Architecture
//!
//! The module uses a trait-based design:
//! - [`Complete`]: core trait for sending a message list and receiving the
//!   completion text
//! - [`ClovaClient`]: the real HTTP implementation
//!
//! The batch and retry drivers are generic over [`Complete`], which keeps
//! them testable without network access.
//!
//! # Error Strings
//!
//! Failures are carried as [`CallError`] strings that embed the HTTP status
//! code and the response body. The CLOVA gateway reports policy failures with
//! numeric codes (`40005`, `40006`) inside the body and rate limiting as HTTP
//! `429`; the retry driver classifies errors by matching those substrings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::utils::truncate_for_log;

/// Chat-completions endpoint for the HCX-003 model.
pub const COMPLETIONS_URL: &str =
    "https://clovastudio.stream.ntruss.com/testapp/v1/chat-completions/HCX-003";

/// Chat-tokenize endpoint for the HCX-003 model.
pub const TOKENIZER_URL: &str =
    "https://clovastudio.apigw.ntruss.com/v1/api-tools/chat-tokenize/HCX-003";

const API_KEY_HEADER: &str = "X-NCP-CLOVASTUDIO-API-KEY";
const APIGW_KEY_HEADER: &str = "X-NCP-APIGW-API-KEY";

/// A single role/content message in a chat request or response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A failed API call, described as text.
///
/// The description deliberately embeds whatever status codes the transport or
/// gateway produced so callers can classify the failure by substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError(pub String);

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CallError {}

/// Trait for sending a message list to a completion backend.
///
/// Implemented by [`ClovaClient`] for the real API and by scripted mocks in
/// the batch/retry tests.
pub trait Complete {
    /// Send the messages and return the completion text.
    async fn complete(&self, messages: &[Message]) -> Result<String, CallError>;
}

/// Request body for the chat-completions endpoint.
///
/// Field names follow the CLOVA wire format, hence the camelCase renames.
/// Sampling parameters are fixed; the pipeline only varies the messages.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "includeAiFilters")]
    include_ai_filters: bool,
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
    temperature: f64,
    messages: &'a [Message],
    #[serde(rename = "repeatPenalty")]
    repeat_penalty: f64,
    #[serde(rename = "topP")]
    top_p: f64,
}

impl<'a> CompletionRequest<'a> {
    fn new(messages: &'a [Message]) -> Self {
        Self {
            top_k: 0,
            include_ai_filters: true,
            max_tokens: 200,
            temperature: 0.25,
            messages,
            repeat_penalty: 4.0,
            top_p: 0.8,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: Option<CompletionResult>,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    status: Option<ApiStatus>,
    result: Option<TokenizeResult>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: String,
}

#[derive(Debug, Deserialize)]
struct TokenizeResult {
    messages: Vec<TokenCount>,
}

#[derive(Debug, Deserialize)]
struct TokenCount {
    count: u64,
}

/// HTTP client for the CLOVA Studio endpoints.
#[derive(Debug, Clone)]
pub struct ClovaClient {
    http: reqwest::Client,
    api_key: String,
    apigw_api_key: String,
    completions_url: String,
    tokenizer_url: String,
}

impl ClovaClient {
    pub fn new(api_key: String, apigw_api_key: String) -> Self {
        Self::with_urls(
            api_key,
            apigw_api_key,
            COMPLETIONS_URL.to_string(),
            TOKENIZER_URL.to_string(),
        )
    }

    /// Construct against explicit endpoint URLs.
    pub fn with_urls(
        api_key: String,
        apigw_api_key: String,
        completions_url: String,
        tokenizer_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            apigw_api_key,
            completions_url,
            tokenizer_url,
        }
    }

    async fn post_json(&self, url: &str, body: serde_json::Value) -> Result<String, CallError> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(APIGW_KEY_HEADER, &self.apigw_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallError(format!("Failed to read response body: {e}")))?;

        if status.as_u16() != 200 {
            return Err(CallError(format!(
                "API call failed: {}, {}",
                status.as_u16(),
                text
            )));
        }
        if text.is_empty() {
            return Err(CallError("Empty response received".to_string()));
        }
        Ok(text)
    }

    /// Count the tokens the model would see for a message list.
    #[instrument(level = "info", skip_all)]
    pub async fn count_tokens(&self, messages: &[Message]) -> Result<u64, CallError> {
        let body = serde_json::json!({ "messages": messages });
        let text = self.post_json(&self.tokenizer_url, body).await?;

        let parsed: TokenizeResponse = serde_json::from_str(&text).map_err(|e| {
            CallError(format!(
                "JSON decoding error: {e} - response text: {}",
                truncate_for_log(&text, 100)
            ))
        })?;

        let code = parsed.status.map(|s| s.code).unwrap_or_default();
        if code != "20000" {
            return Err(CallError(format!("Tokenizer returned status {code}")));
        }

        let total = parsed
            .result
            .map(|r| r.messages.iter().map(|m| m.count).sum())
            .unwrap_or(0);
        info!(total, "Token count computed");
        Ok(total)
    }
}

impl Complete for ClovaClient {
    #[instrument(level = "info", skip_all)]
    async fn complete(&self, messages: &[Message]) -> Result<String, CallError> {
        let t0 = Instant::now();
        let request = CompletionRequest::new(messages);
        let body = serde_json::to_value(&request)
            .map_err(|e| CallError(format!("Failed to encode request: {e}")))?;

        let result = self.post_json(&self.completions_url, body).await;
        let dt = t0.elapsed();

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "API call failed");
                return Err(e);
            }
        };

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|e| {
            CallError(format!(
                "JSON decoding error: {e} - response text: {}",
                truncate_for_log(&text, 100)
            ))
        })?;

        let content = parsed
            .result
            .and_then(|r| r.message)
            .map(|m| m.content)
            .ok_or_else(|| {
                CallError(
                    "Unexpected response format: 'result' or 'message' key missing".to_string(),
                )
            })?;

        info!(
            elapsed_ms = dt.as_millis() as u128,
            bytes = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_wire_format() {
        let messages = vec![Message::system("프롬프트"), Message::user("본문")];
        let request = CompletionRequest::new(&messages);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["topK"], 0);
        assert_eq!(value["includeAiFilters"], true);
        assert_eq!(value["maxTokens"], 200);
        assert_eq!(value["temperature"], 0.25);
        assert_eq!(value["repeatPenalty"], 4.0);
        assert_eq!(value["topP"], 0.8);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "본문");
    }

    #[test]
    fn test_completion_response_content_path() {
        let text = r#"{"result":{"message":{"role":"assistant","content":"응답"}}}"#;
        let parsed: CompletionResponse = serde_json::from_str(text).unwrap();
        let content = parsed.result.unwrap().message.unwrap().content;
        assert_eq!(content, "응답");
    }

    #[test]
    fn test_completion_response_missing_message() {
        let text = r#"{"result":{}}"#;
        let parsed: CompletionResponse = serde_json::from_str(text).unwrap();
        assert!(parsed.result.unwrap().message.is_none());
    }

    #[test]
    fn test_tokenize_response_sums_counts() {
        let text = r#"{
            "status": {"code": "20000"},
            "result": {"messages": [{"count": 12}, {"count": 30}]}
        }"#;
        let parsed: TokenizeResponse = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.status.unwrap().code, "20000");
        let total: u64 = parsed.result.unwrap().messages.iter().map(|m| m.count).sum();
        assert_eq!(total, 42);
    }

    #[test]
    fn test_message_constructors() {
        let m = Message::system("지시문");
        assert_eq!(m.role, "system");
        let m = Message::user("기사 본문");
        assert_eq!(m.role, "user");
    }

    #[test]
    fn test_call_error_display_keeps_codes() {
        let e = CallError("API call failed: 429, Too Many Requests".to_string());
        assert!(e.to_string().contains("429"));
    }
}
