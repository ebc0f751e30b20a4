//! Reqwest-backed Qianfan platform client.
//!
//! Auth is the platform's OAuth client-credentials flow: an access token is
//! fetched with the account's API key/secret key pair, cached, and refreshed
//! ahead of expiry. The token travels as a query parameter on every call.

use crate::{
    ChatRequest, ChatResponse, ClientError, ImageRequest, ImageResponse, QianfanApi,
};
use async_trait::async_trait;
use qianfan_common::config::ChatModel;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::RwLock;

const DEFAULT_BASE_URL: &str = "https://aip.baidubce.com";

/// Refresh the cached token this many seconds before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Qianfan API client.
pub struct QianfanClient {
    client: reqwest::Client,
    api_key: String,
    secret_key: String,
    base_url: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

impl QianfanClient {
    /// Create a new client for the production endpoint.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, secret_key, DEFAULT_BASE_URL)
    }

    /// Create with a custom base URL (used by tests).
    pub fn with_base_url(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            base_url: base_url.into(),
            token: RwLock::new(None),
        }
    }

    /// Get a valid access token, fetching or refreshing as needed.
    async fn access_token(&self) -> Result<String, ClientError> {
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > now + TOKEN_REFRESH_MARGIN_SECS {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!("{}/oauth/2.0/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.secret_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth(format!("HTTP {status}: {body}")));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Auth(format!("malformed token response: {e}")))?;

        if let Some(error) = token_response.error {
            return Err(ClientError::Auth(format!(
                "{error}: {}",
                token_response.error_description.unwrap_or_default()
            )));
        }

        let access_token = token_response
            .access_token
            .ok_or_else(|| ClientError::Auth("token response missing access_token".into()))?;

        let cached = CachedToken {
            access_token: access_token.clone(),
            expires_at: now + token_response.expires_in.unwrap_or(0),
        };
        *self.token.write().await = Some(cached);

        tracing::debug!("Access token refreshed");
        Ok(access_token)
    }

    /// POST a JSON body, read back the JSON response, and surface in-body
    /// `error_code` errors. Qianfan reports request errors inside a 200 body.
    async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, ClientError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(url)
            .query(&[("access_token", token.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        if let Some(code) = raw.get("error_code").and_then(serde_json::Value::as_i64) {
            let message = raw
                .get("error_msg")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ClientError::Api { code, message });
        }

        serde_json::from_value(raw).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

/// The wenxinworkshop chat route for a model.
fn chat_route(model: ChatModel) -> &'static str {
    match model {
        ChatModel::ErnieBot4 => "completions_pro",
        ChatModel::ErnieBot8k => "ernie_bot_8k",
        ChatModel::ErnieBot => "completions",
        ChatModel::ErnieBotTurbo => "eb-instant",
        ChatModel::EbTurboAppBuilder => "ai_apaas",
        ChatModel::Yi34bChat => "yi_34b_chat",
        ChatModel::Bloomz7b => "bloomz_7b1",
        ChatModel::QianfanBloomz7bCompressed => "qianfan_bloomz_7b_compressed",
        ChatModel::Llama27bChat => "llama_2_7b",
        ChatModel::Llama213bChat => "llama_2_13b",
        ChatModel::Llama270bChat => "llama_2_70b",
        ChatModel::QianfanChineseLlama27b => "qianfan_chinese_llama_2_7b",
        ChatModel::QianfanChineseLlama213b => "qianfan_chinese_llama_2_13b",
        ChatModel::Chatglm26b32k => "chatglm2_6b_32k",
        ChatModel::Xuanyuan70bChat4bit => "xuanyuan_70b_chat_4bit",
        ChatModel::ChatLaw => "chatlaw",
        ChatModel::AquilaChat7b => "aquilachat_7b",
    }
}

#[async_trait]
impl QianfanApi for QianfanClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClientError> {
        let start = Instant::now();

        let route = request
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .map_or_else(|| chat_route(request.model).to_string(), str::to_string);

        let url = format!(
            "{}/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/{route}",
            self.base_url
        );

        let body = ChatBody {
            messages: request.messages,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            penalty_score: request.penalty_score,
            system: request.system,
            user_id: request.user_id,
        };

        let response: ChatResponse = self.post_json(&url, &body).await?;

        tracing::debug!(
            model = request.model.as_str(),
            route = %route,
            latency_ms = start.elapsed().as_millis() as u64,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            need_clear_history = response.need_clear_history,
            "chat completion"
        );
        Ok(response)
    }

    async fn imagine(&self, request: ImageRequest) -> Result<ImageResponse, ClientError> {
        let start = Instant::now();
        let url = format!(
            "{}/rpc/2.0/ai_custom/v1/wenxinworkshop/text2image/sd_xl",
            self.base_url
        );

        let body = ImageBody {
            prompt: request.prompt,
            style: request.style.map(|s| s.as_str()),
            size: request.size,
            sampler_index: request.sampler_index,
            user_id: request.user_id,
        };

        let response: ImageResponse = self.post_json(&url, &body).await?;

        tracing::debug!(
            images = response.data.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "text2image"
        );
        Ok(response)
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatBody {
    messages: Vec<crate::ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    penalty_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageBody {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sampler_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}
