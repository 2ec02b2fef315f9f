use crate::response::parse_tag_list;
use crate::{
    classification_prompt, ClassificationOracle, ImagePart, OracleInput, ProviderError,
};
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
}

impl OpenAiConfig {
    /// Reads the API key from `OPENAI_API_KEY`. The base URL falls back to
    /// `OPENAI_BASE_URL`, then to the public endpoint.
    pub fn from_env(chat_model: &str, base_url: Option<&str>) -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingCredential("OPENAI_API_KEY"))?;
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    content: Option<String>,
}

fn image_part(image: &ImagePart) -> ContentPart {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
    ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: format!("data:{};base64,{}", image.mime, encoded),
        },
    }
}

fn build_content(input: &OracleInput, allowed: &[String]) -> Vec<ContentPart> {
    let mut parts = vec![ContentPart::Text {
        text: classification_prompt(input.kind(), allowed),
    }];
    match input {
        OracleInput::Text(text) => parts.push(ContentPart::Text {
            text: format!("Text content (truncated):\n{text}"),
        }),
        OracleInput::Image(image) => parts.push(image_part(image)),
        OracleInput::Pages(pages) => parts.extend(pages.iter().map(image_part)),
    }
    parts
}

#[async_trait::async_trait]
impl ClassificationOracle for OpenAiProvider {
    async fn classify(
        &self,
        input: &OracleInput,
        allowed: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        debug!(model = %self.cfg.chat_model, kind = ?input.kind(), "sending classification request");
        let body = ChatRequest {
            model: &self.cfg.chat_model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: build_content(input, allowed),
            }],
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.cfg.base_url))
            .bearer_auth(&self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {}",
                status, body
            )));
        }

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        parse_tag_list(&content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
