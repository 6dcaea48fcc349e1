use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::{AnalyzeError, TextAnalyzer};
use crate::domain::interview::{AnswerAssessment, FaqBook, FaqMatch, InterviewSummary, QaPair};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Claude API を使用した解析器
pub struct ClaudeAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    organization: String,
}

#[derive(Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl ClaudeAnalyzer {
    pub fn new(
        api_key: String,
        model: String,
        organization: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzeError::NotAvailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            organization: organization.into(),
        })
    }

    async fn complete(
        &self,
        system: &str,
        user_msg: String,
        max_tokens: u32,
    ) -> Result<String, AnalyzeError> {
        let request = MessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_msg,
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyzeError::Timeout
                } else {
                    AnalyzeError::Failed(format!("HTTP request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzeError::Failed(format!(
                "Claude API error: {status} - {body}"
            )));
        }

        let msg_response: MessageResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeError::Failed(format!("Response parse error: {e}")))?;

        let text = msg_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AnalyzeError::Failed("Empty response from Claude API".to_string()));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextAnalyzer for ClaudeAnalyzer {
    async fn assess_answer(
        &self,
        question: &str,
        answer: &str,
    ) -> Result<AnswerAssessment, AnalyzeError> {
        let reply = self
            .complete(prompts::SYSTEM_ASSESS, prompts::build_assess_prompt(question, answer), 8)
            .await?;
        Ok(prompts::parse_assessment(&reply))
    }

    async fn classify_faq(&self, query: &str, faqs: &FaqBook) -> Result<FaqMatch, AnalyzeError> {
        if faqs.is_empty() {
            return Ok(FaqMatch::NoMatch);
        }
        let reply = self
            .complete(prompts::SYSTEM_FAQ, prompts::build_faq_prompt(query, faqs), 8)
            .await?;
        Ok(prompts::parse_faq_reply(&reply, faqs.len()))
    }

    async fn summarize(
        &self,
        candidate_name: &str,
        answers: &[QaPair],
    ) -> Result<InterviewSummary, AnalyzeError> {
        let user_msg = prompts::build_summary_prompt(&self.organization, candidate_name, answers);
        let reply = self.complete(prompts::SYSTEM_SUMMARY, user_msg, 1024).await?;
        Ok(prompts::parse_summary_reply(&reply, candidate_name))
    }

    fn name(&self) -> &str {
        "claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ClaudeAnalyzer {
        ClaudeAnalyzer::new(
            "test-key".to_string(),
            "claude-sonnet-4-20250514".to_string(),
            "LunarTech",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_claude_analyzer_name() {
        assert_eq!(analyzer().name(), "claude");
    }

    #[tokio::test]
    async fn empty_faq_book_skips_request() {
        let m = analyzer().classify_faq("how much", &FaqBook::default()).await.unwrap();
        assert_eq!(m, FaqMatch::NoMatch);
    }
}
