//! Command handlers: the chat round trip and the standalone imagine command.

use crate::reply::Reply;
use crate::request::shape_chat_request;
use qianfan_client::{ChatMessage, ChatRequest, ImageRequest, QianfanApi};
use qianfan_common::{Config, Error, Result};
use qianfan_history::SessionWindow;
use std::sync::Arc;

/// Resolution used for reply illustrations.
const ILLUSTRATION_SIZE: &str = "1024x576";

/// Diffusion sampler used for reply illustrations.
const ILLUSTRATION_SAMPLER: &str = "DPM++ 2M SDE Karras";

fn upstream(e: impl std::fmt::Display) -> Error {
    Error::Upstream(e.to_string())
}

/// Handles one invocation of the chat command.
pub struct ChatHandler {
    api: Arc<dyn QianfanApi>,
    window: SessionWindow,
    config: Config,
}

impl ChatHandler {
    pub fn new(api: Arc<dyn QianfanApi>, window: SessionWindow, config: Config) -> Self {
        Self {
            api,
            window,
            config,
        }
    }

    /// Run one chat exchange: resolve the message window, call the model,
    /// record the turn pair, and optionally illustrate the reply.
    pub async fn handle(&self, user_id: &str, prompt: Option<&str>) -> Result<Reply> {
        let messages = self.window.resolve(user_id, &self.config.command, prompt)?;
        let request = shape_chat_request(&self.config, messages, user_id);

        let response = self.api.chat(request).await.map_err(upstream)?;

        if response.need_clear_history {
            // Flagged exchange: inform the user, record nothing.
            return Err(Error::SensitiveContent);
        }

        if self.config.history.enabled {
            self.window.record(
                user_id,
                &self.config.command,
                prompt,
                &response.result,
                response.usage,
            )?;
        }

        if self.config.image.enabled {
            let image = self.illustrate(&response.result).await?;
            return Ok(Reply::with_image(response.result, image));
        }

        Ok(Reply::text(response.result))
    }

    /// Chain two chat calls to synthesize an English drawing prompt from the
    /// reply, then render it.
    async fn illustrate(&self, reply_text: &str) -> Result<String> {
        let keywords = self
            .prompt_chat(format!(
                "你是一个AI绘画助手。\n\n{reply_text}\n\n使用一句话回答，以上内容的绘画关键词是："
            ))
            .await?;
        tracing::debug!(keywords = %keywords, "drawing keywords extracted");

        let english = self
            .prompt_chat(format!(
                "你是一个中英翻译助手。\n\n{keywords}\n\n使用一句话回答，不需要简化，以上内容翻译为英文是："
            ))
            .await?;
        tracing::debug!(prompt = %english, "drawing prompt translated");

        let mut request = ImageRequest::new(english);
        request.style = Some(self.config.image.style);
        request.size = Some(ILLUSTRATION_SIZE.into());
        request.sampler_index = Some(ILLUSTRATION_SAMPLER.into());

        let response = self.api.imagine(request).await.map_err(upstream)?;
        response
            .data
            .into_iter()
            .next()
            .map(|image| image.b64_image)
            .ok_or_else(|| Error::Upstream("empty image response".into()))
    }

    /// A bare single-message chat call on the configured model/endpoint.
    async fn prompt_chat(&self, content: String) -> Result<String> {
        let mut request = ChatRequest::new(self.config.model, vec![ChatMessage::user(content)]);
        request.endpoint = self.config.custom_endpoint().map(str::to_string);

        let response = self.api.chat(request).await.map_err(upstream)?;
        Ok(response.result)
    }
}

/// Handles the standalone text-to-image command.
pub struct ImagineHandler {
    api: Arc<dyn QianfanApi>,
}

impl ImagineHandler {
    pub fn new(api: Arc<dyn QianfanApi>) -> Self {
        Self { api }
    }

    /// Render the prompt with platform defaults for style and size.
    pub async fn handle(&self, user_id: &str, prompt: &str) -> Result<Reply> {
        let mut request = ImageRequest::new(prompt);
        request.user_id = Some(user_id.to_string());

        let response = self.api.imagine(request).await.map_err(upstream)?;
        response
            .data
            .into_iter()
            .next()
            .map(|image| Reply::image(image.b64_image))
            .ok_or_else(|| Error::Upstream("empty image response".into()))
    }
}
