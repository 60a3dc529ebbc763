//! HTTP chat-completion adapter implementing `LlmProvider`.
//!
//! Used for two narrow purposes (spec §6.1): domain naming (§4.2.5) and
//! domain self-assessment (§4.4.1). Both are internal-only uses — a failure
//! here is classified `llm_unreachable` and never aborts a query (spec §7);
//! callers fall back locally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use corpus_core::error::CoreError;
use corpus_core::ports::{LlmProvider, Result, SelfAssessment};

#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub endpoint: String,
    pub model: String,
    pub retries: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "default".to_string(),
            retries: 3,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HttpLlmProvider {
    client: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlmProvider {
    pub fn new(config: HttpLlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        corpus_core::retry::retry_idempotent(
            self.config.retries,
            self.config.backoff_base,
            |_: &CoreError| true,
            || async {
                self.complete_once(system, user)
                    .await
                    .map_err(|e| CoreError::LlmUnreachable(e.to_string()))
            },
        )
        .await
    }

    async fn complete_once(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let req = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system".into(), content: system.into() },
                ChatMessage { role: "user".into(), content: user.into() },
            ],
        };
        let resp = self
            .client
            .post(&self.config.endpoint)
            .json(&req)
            .send()
            .await?
            .error_for_status()?;
        let body: ChatResponse = resp.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("empty completion response"))
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn name_cluster(&self, snippets: &[String], max_len: usize) -> Result<String> {
        let joined = snippets.iter().take(20).cloned().collect::<Vec<_>>().join("\n");
        let user = format!(
            "다음은 하나의 주제 군집에 속한 법령 조문 발췌들이다. 이 군집을 대표하는 \
             {max_len}자 이내의 한국어 명사구를 한 줄로만 답하라:\n{joined}"
        );
        let raw = self
            .complete("당신은 법령 조문을 간결한 주제어로 요약하는 도우미입니다.", &user)
            .await?;
        let trimmed = raw.trim().lines().next().unwrap_or("").trim().to_string();
        if trimmed.is_empty() {
            return Err(CoreError::LlmUnreachable("empty cluster name".to_string()));
        }
        Ok(trimmed.chars().take(max_len).collect())
    }

    async fn assess_domain_fit(
        &self,
        domain_name: &str,
        representative_snippets: &[String],
        query: &str,
    ) -> Result<SelfAssessment> {
        let joined = representative_snippets.join("\n");
        let user = format!(
            "도메인 이름: {domain_name}\n대표 조문:\n{joined}\n\n질문: {query}\n\n\
             이 도메인의 전문가가 이 질문에 답할 수 있는가? JSON으로만 답하라: \
             {{\"can_answer\": bool, \"confidence\": 0.0-1.0}}"
        );
        let raw = self
            .complete("당신은 법령 도메인 적합성을 판정하는 평가자입니다.", &user)
            .await?;
        parse_assessment(&raw)
            .ok_or_else(|| CoreError::LlmUnreachable("unparseable self-assessment".to_string()))
    }
}

fn parse_assessment(raw: &str) -> Option<SelfAssessment> {
    #[derive(Deserialize)]
    struct Parsed {
        can_answer: bool,
        confidence: f32,
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    let slice = raw.get(start..=end)?;
    let parsed: Parsed = serde_json::from_str(slice).ok()?;
    Some(SelfAssessment {
        can_answer: parsed.can_answer,
        confidence: parsed.confidence.clamp(0.0, 1.0),
    })
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
