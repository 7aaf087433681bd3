use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use harvest_core::error::AppError;
use harvest_core::traits::{LabeledLink, LinkLabel, SemanticExtractor};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_SYSTEM_PROMPT: &str = "You are a crawl assistant for a document harvester. You are given links found on a listing page. Label each link 'target' if it points directly at a downloadable document (PDF, DOC, attachment), 'seed' if it points at another listing or index page worth crawling, or 'ignore' otherwise. Respond ONLY with valid JSON matching the requested schema.";

/// Upper bound on candidate links sent to the model per page.
const MAX_LINKS: usize = 200;

/// OpenAI-compatible link labeler.
///
/// Instead of shipping raw HTML to the model, the page's anchors are
/// extracted locally and sent as a `{url, text}` list, which is cheaper, and the
/// model can only answer with URLs that actually exist on the page
/// (anything else in its reply is discarded).
#[derive(Clone)]
pub struct OpenAiLinkLabeler {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    system_prompt: String,
}

impl OpenAiLinkLabeler {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let mut rebuilt = Self::build(&self.api_key, &self.model, &self.base_url, timeout)?;
        rebuilt.system_prompt = self.system_prompt;
        Ok(rebuilt)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }
}

// ---- Candidate extraction ----

#[derive(Serialize)]
struct Candidate {
    url: String,
    text: String,
}

fn candidates(html: &str, base_url: &str) -> Result<Vec<Candidate>, AppError> {
    let base = Url::parse(base_url)
        .map_err(|e| AppError::ValidationError(format!("Invalid base URL '{base_url}': {e}")))?;
    let selector = Selector::parse("a[href]")
        .map_err(|e| AppError::Generic(format!("Selector parse failed: {e}")))?;

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for element in document.select(&selector) {
        if out.len() >= MAX_LINKS {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);
        let url = resolved.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }
        let text: String = element.text().collect::<String>().trim().chars().take(120).collect();
        out.push(Candidate { url, text });
    }

    Ok(out)
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: JsonSchemaWrapper,
}

#[derive(Serialize)]
struct JsonSchemaWrapper {
    name: String,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct Labeling {
    links: Vec<LabeledRow>,
}

#[derive(Deserialize)]
struct LabeledRow {
    url: String,
    label: String,
}

fn labeling_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": { "type": "string" },
                        "label": { "type": "string", "enum": ["seed", "target", "ignore"] }
                    },
                    "required": ["url", "label"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["links"],
        "additionalProperties": false
    })
}

impl SemanticExtractor for OpenAiLinkLabeler {
    async fn label_links(
        &self,
        content: &str,
        base_url: &str,
    ) -> Result<Vec<LabeledLink>, AppError> {
        let candidates = candidates(content, base_url)?;
        if candidates.is_empty() {
            return Ok(vec![]);
        }
        let known: HashSet<&str> = candidates.iter().map(|c| c.url.as_str()).collect();

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: format!(
                        "Links found on {}:\n```json\n{}\n```\nLabel each one.",
                        base_url,
                        serde_json::to_string_pretty(&candidates)?
                    ),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaWrapper {
                    name: "link_labeling".to_string(),
                    strict: true,
                    schema: labeling_schema(),
                },
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            return Err(AppError::ExtractorError {
                message,
                status_code,
                retryable: status_code == 429 || status_code >= 500,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse extractor response: {e}")))?;

        let content_str = chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| AppError::ExtractorError {
                message: "Empty response from extractor".into(),
                status_code: 200,
                retryable: false,
            })?;

        let labeling: Labeling =
            serde_json::from_str(content_str).map_err(|e| AppError::ExtractorError {
                message: format!("Extractor returned invalid JSON: {e}. Raw: {content_str}"),
                status_code: 200,
                retryable: false,
            })?;

        let mut out = Vec::new();
        for row in labeling.links {
            // Only URLs that were actually on the page count; anything
            // invented by the model is dropped.
            if !known.contains(row.url.as_str()) {
                tracing::debug!(url = %row.url, "Dropping label for URL not on page");
                continue;
            }
            let label = match row.label.as_str() {
                "target" => LinkLabel::Target,
                "seed" => LinkLabel::Seed,
                _ => continue,
            };
            out.push(LabeledLink::new(row.url, label));
        }
        Ok(out)
    }
}
