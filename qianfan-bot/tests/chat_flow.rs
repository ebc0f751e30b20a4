//! End-to-end handler tests against a scripted mock API.
//!
//! Exercises the full command flow: window resolution, request shaping,
//! sensitive-content gating, turn recording, and the illustration chain.

use async_trait::async_trait;
use qianfan_bot::{ChatHandler, ImagineHandler};
use qianfan_client::{
    ChatRequest, ChatResponse, ClientError, ImageData, ImageRequest, ImageResponse, QianfanApi,
    Role, Usage,
};
use qianfan_common::{Config, Error};
use qianfan_history::{SessionWindow, TurnStore, BOOTSTRAP_PROMPT};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Scripted API double: serves chat responses in order and records every
/// request it sees.
struct MockApi {
    chat_requests: Mutex<Vec<ChatRequest>>,
    chat_responses: Mutex<Vec<ChatResponse>>,
    image_requests: Mutex<Vec<ImageRequest>>,
    fail_chat: bool,
}

impl MockApi {
    fn with_replies(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            chat_requests: Mutex::new(Vec::new()),
            chat_responses: Mutex::new(replies),
            image_requests: Mutex::new(Vec::new()),
            fail_chat: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            chat_requests: Mutex::new(Vec::new()),
            chat_responses: Mutex::new(Vec::new()),
            image_requests: Mutex::new(Vec::new()),
            fail_chat: true,
        })
    }

    fn chat_request(&self, index: usize) -> ChatRequest {
        self.chat_requests.lock().unwrap()[index].clone()
    }

    fn chat_call_count(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
    }
}

fn reply(text: &str) -> ChatResponse {
    ChatResponse {
        result: text.into(),
        usage: Usage {
            prompt_tokens: 5,
            completion_tokens: 9,
            total_tokens: 14,
        },
        need_clear_history: false,
    }
}

fn flagged_reply() -> ChatResponse {
    ChatResponse {
        result: String::new(),
        usage: Usage::default(),
        need_clear_history: true,
    }
}

#[async_trait]
impl QianfanApi for MockApi {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClientError> {
        self.chat_requests.lock().unwrap().push(request);
        if self.fail_chat {
            return Err(ClientError::Status {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        let mut responses = self.chat_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(reply("fallback"))
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn imagine(&self, request: ImageRequest) -> Result<ImageResponse, ClientError> {
        self.image_requests.lock().unwrap().push(request);
        Ok(ImageResponse {
            data: vec![ImageData {
                b64_image: "aW1n".into(),
            }],
        })
    }
}

fn chat_handler(config: Config, api: Arc<MockApi>) -> (TempDir, Arc<TurnStore>, ChatHandler) {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(TurnStore::new(&tmp.path().join("turns.db")).unwrap());
    let window = SessionWindow::new(store.clone(), config.history.clone());
    let handler = ChatHandler::new(api, window, config);
    (tmp, store, handler)
}

#[tokio::test]
async fn single_turn_chat_without_history() {
    let api = MockApi::with_replies(vec![reply("你好")]);
    let (_tmp, store, handler) = chat_handler(Config::default(), api.clone());

    let result = handler.handle("u1", Some("hello")).await.unwrap();
    assert_eq!(result.text, "你好");
    assert!(result.image_b64.is_none());

    let request = api.chat_request(0);
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, Role::User);
    assert_eq!(request.messages[0].content, "hello");

    // history disabled: nothing recorded
    assert_eq!(store.count("u1", "chat").unwrap(), 0);
}

#[tokio::test]
async fn empty_prompt_without_history_is_rejected() {
    let api = MockApi::with_replies(vec![]);
    let (_tmp, _store, handler) = chat_handler(Config::default(), api.clone());

    let err = handler.handle("u1", None).await.unwrap_err();
    assert!(matches!(err, Error::EmptyPrompt));
    assert_eq!(api.chat_call_count(), 0);
}

#[tokio::test]
async fn multi_turn_session_round_trip() {
    let mut config = Config::default();
    config.history.enabled = true;
    let api = MockApi::with_replies(vec![reply("你好，我们开始吧"), reply("好的")]);
    let (_tmp, store, handler) = chat_handler(config, api.clone());

    // bootstrap the session
    let first = handler.handle("u1", None).await.unwrap();
    assert_eq!(first.text, "你好，我们开始吧");
    assert_eq!(store.count("u1", "chat").unwrap(), 2);

    // follow-up carries the bootstrap exchange
    handler.handle("u1", Some("讲个笑话")).await.unwrap();
    let request = api.chat_request(1);
    assert_eq!(request.messages.len(), 3);
    assert_eq!(request.messages[0].content, BOOTSTRAP_PROMPT);
    assert_eq!(request.messages[1].role, Role::Assistant);
    assert_eq!(request.messages[1].content, "你好，我们开始吧");
    assert_eq!(request.messages[2].content, "讲个笑话");

    assert_eq!(store.count("u1", "chat").unwrap(), 4);
}

#[tokio::test]
async fn prompt_without_active_session_is_rejected() {
    let mut config = Config::default();
    config.history.enabled = true;
    let api = MockApi::with_replies(vec![]);
    let (_tmp, _store, handler) = chat_handler(config, api.clone());

    let err = handler.handle("u1", Some("hi")).await.unwrap_err();
    assert_eq!(err.user_message(), "请先使用`chat`指令开始对话");
    assert!(matches!(err, Error::NoActiveSession { command } if command == "chat"));
    assert_eq!(api.chat_call_count(), 0);
}

#[tokio::test]
async fn flagged_exchange_is_not_recorded() {
    let mut config = Config::default();
    config.history.enabled = true;
    let api = MockApi::with_replies(vec![flagged_reply()]);
    let (_tmp, store, handler) = chat_handler(config, api.clone());

    let err = handler.handle("u1", None).await.unwrap_err();
    assert!(matches!(err, Error::SensitiveContent));
    assert_eq!(store.count("u1", "chat").unwrap(), 0);
}

#[tokio::test]
async fn upstream_failure_surfaces_and_records_nothing() {
    let mut config = Config::default();
    config.history.enabled = true;
    let api = MockApi::failing();
    let (_tmp, store, handler) = chat_handler(config, api.clone());

    let err = handler.handle("u1", None).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
    assert_eq!(err.user_message(), "请求错误");
    assert_eq!(store.count("u1", "chat").unwrap(), 0);
}

#[tokio::test]
async fn illustration_chains_two_prompts_and_renders() {
    let mut config = Config::default();
    config.image.enabled = true;
    let api = MockApi::with_replies(vec![
        reply("这是一只在屋顶晒太阳的橘猫"),
        reply("橘猫，屋顶，阳光"),
        reply("an orange cat sunbathing on a roof"),
    ]);
    let (_tmp, _store, handler) = chat_handler(config, api.clone());

    let result = handler.handle("u1", Some("describe a cat")).await.unwrap();
    assert_eq!(result.text, "这是一只在屋顶晒太阳的橘猫");
    assert_eq!(result.image_b64.as_deref(), Some("aW1n"));

    // reply -> keyword extraction -> translation
    assert_eq!(api.chat_call_count(), 3);
    let keyword_request = api.chat_request(1);
    assert!(keyword_request.messages[0].content.contains("绘画关键词"));
    assert!(keyword_request.messages[0]
        .content
        .contains("这是一只在屋顶晒太阳的橘猫"));
    let translation_request = api.chat_request(2);
    assert!(translation_request.messages[0].content.contains("翻译为英文"));
    assert!(translation_request.messages[0].content.contains("橘猫，屋顶，阳光"));

    let image_request = api.image_requests.lock().unwrap().remove(0);
    assert_eq!(image_request.prompt, "an orange cat sunbathing on a roof");
    assert_eq!(image_request.size.as_deref(), Some("1024x576"));
    assert_eq!(
        image_request.sampler_index.as_deref(),
        Some("DPM++ 2M SDE Karras")
    );
}

#[tokio::test]
async fn imagine_command_forwards_prompt() {
    let api = MockApi::with_replies(vec![]);
    let handler = ImagineHandler::new(api.clone());

    let result = handler.handle("u1", "a red fox").await.unwrap();
    assert_eq!(result.image_b64.as_deref(), Some("aW1n"));
    assert!(result.text.is_empty());

    let request = api.image_requests.lock().unwrap().remove(0);
    assert_eq!(request.prompt, "a red fox");
    assert_eq!(request.user_id.as_deref(), Some("u1"));
    // platform defaults: no style or size overrides
    assert!(request.style.is_none());
    assert!(request.size.is_none());
}
