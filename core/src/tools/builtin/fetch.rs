//! Outbound HTTP fetch tool

use super::truncate_output;
use crate::error::ToolError;
use crate::tools::{Tool, ToolCall, ToolExample};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Fetches an http(s) URL and returns the response body as text
pub struct FetchUrlTool {
    client: Client,
    max_bytes: usize,
}

impl FetchUrlTool {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("switchboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, max_bytes }
    }

    fn parse_url(raw: &str) -> Result<Url, ToolError> {
        let url = Url::parse(raw).map_err(|e| ToolError::InvalidParameters {
            message: format!("invalid url '{}': {}", raw, e),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ToolError::InvalidParameters {
                message: format!("unsupported url scheme: {}", other),
            }),
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a web page or API endpoint over HTTP(S) and return the response body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute http or https URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let raw: String = call.get_parameter("url")?;
        let url = Self::parse_url(&raw)?;

        let failed = |message: String| ToolError::ExecutionFailed {
            name: "fetch_url".to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;

        if !status.is_success() {
            return Err(failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_output(&body, 512)
            )));
        }

        Ok(truncate_output(&body, self.max_bytes))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![ToolExample {
            description: "Fetch a JSON document".to_string(),
            arguments: json!({"url": "https://example.com/data.json"}),
            expected_result: "The response body".to_string(),
        }]
    }
}
