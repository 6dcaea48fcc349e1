pub mod claude;
mod keyword;
pub mod prompts;

pub use claude::ClaudeAnalyzer;
pub use keyword::KeywordAnalyzer;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::interview::{AnswerAssessment, FaqBook, FaqMatch, InterviewSummary, QaPair};
use crate::domain::settings::{AnalyzerChoice, AnalyzerSettings};

/// 解析エラー
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Analyzer not available: {0}")]
    NotAvailable(String),
    #[error("Analysis failed: {0}")]
    Failed(String),
    #[error("Analysis timeout")]
    Timeout,
}

/// 回答・FAQ・要約のテキスト解析 trait（キーワード規則か外部 LLM が実装する）
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// 回答が質問に対して明確かどうか
    async fn assess_answer(
        &self,
        question: &str,
        answer: &str,
    ) -> Result<AnswerAssessment, AnalyzeError>;

    /// 候補者の質問に該当する FAQ を探す
    async fn classify_faq(&self, query: &str, faqs: &FaqBook) -> Result<FaqMatch, AnalyzeError>;

    /// 面接全体の要約と候補者情報の抽出
    async fn summarize(
        &self,
        candidate_name: &str,
        answers: &[QaPair],
    ) -> Result<InterviewSummary, AnalyzeError>;

    fn name(&self) -> &str;
}

/// 設定に従って解析器を生成する。Claude は API キーがなければ利用不可。
pub fn create_analyzer(
    settings: &AnalyzerSettings,
    organization: &str,
) -> Result<Box<dyn TextAnalyzer>, AnalyzeError> {
    match settings.backend {
        AnalyzerChoice::Keyword => Ok(Box::new(KeywordAnalyzer::new(organization))),
        AnalyzerChoice::Claude => {
            let api_key = settings
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    AnalyzeError::NotAvailable("ANTHROPIC_API_KEY is not set".to_string())
                })?;
            let analyzer = ClaudeAnalyzer::new(
                api_key,
                settings.model.clone(),
                organization,
                Duration::from_secs(settings.timeout_secs),
            )?;
            Ok(Box::new(analyzer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_backend_by_default() {
        let a = create_analyzer(&AnalyzerSettings::default(), "LunarTech").unwrap();
        assert_eq!(a.name(), "keyword");
    }

    #[test]
    fn claude_backend_with_explicit_key() {
        let settings = AnalyzerSettings {
            backend: AnalyzerChoice::Claude,
            api_key: Some("test-key".into()),
            ..Default::default()
        };
        let a = create_analyzer(&settings, "LunarTech").unwrap();
        assert_eq!(a.name(), "claude");
    }
}
