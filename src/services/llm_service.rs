//! LLM 服务 - 业务能力层
//!
//! 只负责"根据 subject / topic 生成一张思维导图"，不关心重试和流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::Document;
use crate::services::validator::{translate, validate_raw_document};

/// 匹配 ```json ... ``` 代码块
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fenced json regex")
});

const SYSTEM_MESSAGE: &str = "你是一个擅长知识梳理的助手，会把一个学科主题整理成层次清晰的思维导图。\
                              你只输出 JSON，不输出任何解释性文字。";

/// 思维导图生成能力
///
/// 失败时返回 `AppError::ExternalApi`（通信失败，可重试）
/// 或 `AppError::Validation`（返回内容无法使用，不可重试）
#[async_trait]
pub trait MindMapGenerator: Send + Sync {
    async fn generate(&self, subject: &str, topic: &str) -> AppResult<Document>;
}

/// LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        }
    }

    /// 通用的 LLM 调用函数，返回去掉首尾空白的响应文本
    pub async fn send_to_llm(&self, user_message: &str, system_message: Option<&str>) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::external_api(format!("构建系统消息失败: {}", e)))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| AppError::external_api(format!("构建用户消息失败: {}", e)))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| AppError::external_api(format!("构建请求失败: {}", e)))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::external_api(format!("LLM API 调用失败: {}", e))
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::external_api("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl MindMapGenerator for LlmService {
    async fn generate(&self, subject: &str, topic: &str) -> AppResult<Document> {
        let prompt = build_mindmap_prompt(subject, topic);
        let response = self.send_to_llm(&prompt, Some(SYSTEM_MESSAGE)).await?;
        parse_mindmap_response(subject, topic, &response)
    }
}

/// 构建生成思维导图的提示词
fn build_mindmap_prompt(subject: &str, topic: &str) -> String {
    format!(
        r#"请为下面的主题生成一张思维导图。

学科：{subject}
主题：{topic}

【输出要求】
1. 根节点的 text 就是主题本身
2. 子节点按知识点的逻辑层次展开，通常 2 到 4 层
3. 每个节点只有 text 和可选的 children 两个字段
4. 只返回如下格式的 JSON：

{{
  "root": {{
    "text": "{topic}",
    "children": [
      {{ "text": "子主题", "children": [{{ "text": "知识点" }}] }}
    ]
  }}
}}"#
    )
}

/// 从模型响应中取出 JSON 片段
///
/// 依次尝试：整段就是 JSON → ``` 代码块 → 第一个 `{` 到最后一个 `}`
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    if let Some(captures) = FENCED_JSON.captures(trimmed) {
        if let Some(body) = captures.get(1) {
            return Some(body.as_str());
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

/// 把模型响应解析为校验过的文档
pub fn parse_mindmap_response(subject: &str, topic: &str, response: &str) -> AppResult<Document> {
    let payload = extract_json(response)
        .ok_or_else(|| AppError::validation("LLM 返回内容中没有 JSON", crate::utils::logging::truncate_text(response, 80)))?;

    let raw: Value = serde_json::from_str(payload)?;

    if !validate_raw_document(&raw) {
        return Err(AppError::validation(
            "LLM 返回的思维导图结构无效",
            "需要 { root: { text, children? } }",
        ));
    }

    let root = translate(&raw["root"])
        .ok_or_else(|| AppError::validation("LLM 返回的思维导图结构无效", "root.text 缺失"))?;

    Ok(Document::new(subject, topic, root))
}
