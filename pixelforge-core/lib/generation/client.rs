//! Client for the external text-generation provider.
//!
//! One text-in/text-out call per generate/refine. The client owns no retry or
//! rate-limiting logic; a failed call is surfaced to the caller, who decides
//! whether to resubmit. The provider must answer with one JSON object
//! containing at least a `files` map keyed by canonical path; the canonical
//! entry file's content becomes the bundle's `code`.

use std::collections::BTreeMap;

use serde_json::Value;

use pixelforge_utils::CANONICAL_ENTRY_FILE;

use crate::{
    config::ProviderConfig,
    generation::payload::{ChatMessage, ChatRequest, ChatResponse, GeneratedServer, RefinedServer},
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const GENERATE_INSTRUCTION: &str = "You build small self-contained Node.js image-generation \
servers. Answer with exactly one JSON object: {\"files\": {\"server.js\": \"...\"}, \"config\": \
{...}, \"suggestedName\": \"...\", \"suggestedDescription\": \"...\"}. The server.js entry must \
export one async handler(req, res) function handling GET (capabilities) and POST (generation).";

const REFINE_INSTRUCTION: &str = "You refine an existing Node.js image-generation server. Answer \
with exactly one JSON object: {\"files\": {\"server.js\": \"...\"}, \"config\": {...}, \
\"changes\": [\"...\"]}. Preserve the handler contract of the existing code.";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Client wrapping the external text-generation call
#[derive(Debug, Clone)]
pub struct GenerationClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GenerationClient {
    /// Creates a client for the given provider configuration.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Generates a new server bundle from a free-text description.
    pub async fn generate(&self, description: &str) -> PixelforgeResult<GeneratedServer> {
        let text = self.complete(GENERATE_INSTRUCTION, description).await?;
        let object = parse_response_object(&text)?;
        let (code, files) = extract_files(&object)?;

        Ok(GeneratedServer {
            code,
            files,
            config: object.get("config").cloned().unwrap_or_else(default_config),
            suggested_name: string_field(&object, "suggestedName"),
            suggested_description: string_field(&object, "suggestedDescription"),
        })
    }

    /// Refines existing code and configuration with a follow-up prompt.
    pub async fn refine(
        &self,
        existing_code: &str,
        existing_config: &Value,
        prompt: &str,
    ) -> PixelforgeResult<RefinedServer> {
        let user = format!(
            "Current server.js:\n```js\n{}\n```\nCurrent config:\n```json\n{}\n```\nRequested \
             change: {}",
            existing_code, existing_config, prompt
        );
        let text = self.complete(REFINE_INSTRUCTION, &user).await?;
        let object = parse_response_object(&text)?;
        let (code, files) = extract_files(&object)?;

        let changes = object
            .get("changes")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(RefinedServer {
            code,
            files,
            config: object.get("config").cloned().unwrap_or_else(default_config),
            changes,
        })
    }

    /// Performs one completion call and returns the raw response text.
    ///
    /// The credential is checked before any network traffic; a non-success
    /// status surfaces the upstream message.
    async fn complete(&self, instruction: &str, user: &str) -> PixelforgeResult<String> {
        let api_key = self.config.get_api_key().as_deref().ok_or_else(|| {
            PixelforgeError::Configuration(
                "no text-generation provider credential configured".to_string(),
            )
        })?;

        let request = ChatRequest {
            model: self.config.get_model().clone(),
            max_tokens: *self.config.get_max_tokens(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: instruction.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        let url = format!("{}/chat/completions", self.config.get_base_url());
        tracing::debug!(model = %self.config.get_model(), "requesting completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PixelforgeError::ExternalService {
                status: 0,
                message: format!("request to provider failed: {}", e),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PixelforgeError::ExternalService {
                status: status.as_u16(),
                message: format!("failed to read provider response: {}", e),
            })?;

        if !status.is_success() {
            return Err(PixelforgeError::ExternalService {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            PixelforgeError::GenerationParse(format!("provider response is not valid JSON: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                PixelforgeError::GenerationParse("provider returned no choices".to_string())
            })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Locates and parses the first balanced `{...}` span in the response text.
pub(crate) fn parse_response_object(text: &str) -> PixelforgeResult<Value> {
    let span = find_json_span(text).ok_or_else(|| {
        PixelforgeError::GenerationParse("no JSON object found in provider response".to_string())
    })?;

    serde_json::from_str(span).map_err(|e| {
        PixelforgeError::GenerationParse(format!("provider JSON failed to parse: {}", e))
    })
}

/// Returns the first balanced top-level `{...}` span in `text`, tracking
/// string and escape state so braces inside string values do not count.
pub(crate) fn find_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Requires a `files` object in the parsed payload and pulls out the
/// canonical entry file's content as `code`.
fn extract_files(object: &Value) -> PixelforgeResult<(String, BTreeMap<String, String>)> {
    let files_value = object.get("files").and_then(Value::as_object).ok_or_else(|| {
        PixelforgeError::GenerationParse("provider response has no files object".to_string())
    })?;

    let mut files = BTreeMap::new();
    for (path, content) in files_value {
        let content = content.as_str().ok_or_else(|| {
            PixelforgeError::GenerationParse(format!("file '{}' is not a string", path))
        })?;
        files.insert(path.clone(), content.to_string());
    }

    let code = files.get(CANONICAL_ENTRY_FILE).cloned().ok_or_else(|| {
        PixelforgeError::GenerationParse(format!(
            "files object has no canonical entry '{}'",
            CANONICAL_ENTRY_FILE
        ))
    })?;

    Ok((code, files))
}

fn default_config() -> Value {
    Value::Object(serde_json::Map::new())
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
