use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::domain::confidence::{word_count, ConfidenceScorer};
use crate::domain::settings::ConfidenceSettings;
use crate::domain::speech::Listener;
use crate::infra::metrics::Metrics;
use crate::infra::speaker::Speaker;

/// 信頼度が低いときの聞き直し
pub const REPROMPT: &str =
    "I want to make sure I understand you correctly. Could you say that once more?";

/// 聞き直しの方針
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// 1回の質問で聞き取るターン数の上限 (1以上)
    pub max_attempts: u32,
    pub min_confidence: f32,
    /// この語数以上なら信頼度が低くても受け入れる
    pub lenient_word_count: usize,
}

impl From<&ConfidenceSettings> for RetryPolicy {
    fn from(s: &ConfidenceSettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            min_confidence: s.min_confidence,
            lenient_word_count: s.lenient_word_count,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ConfidenceSettings::default())
    }
}

/// 受け入れた理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptReason {
    /// 信頼度が下限以上
    Confident,
    /// 何も聞き取れなかった
    Empty,
    /// 語数が十分
    Lenient,
    /// 試行回数を使い切った
    Exhausted,
}

/// 聞き取り結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredAnswer {
    pub text: String,
    pub confidence: f32,
    pub attempts: u32,
    pub reason: AcceptReason,
}

/// 信頼度に基づいて聞き直すコントローラ。エラーは返さない。
pub struct RetryController {
    scorer: ConfidenceScorer,
    policy: RetryPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl RetryController {
    pub fn new(scorer: ConfidenceScorer, policy: RetryPolicy) -> Self {
        Self {
            scorer,
            policy,
            metrics: None,
        }
    }

    pub fn from_settings(settings: &ConfidenceSettings) -> Self {
        Self::new(
            ConfidenceScorer::new(settings.weights, &settings.filler_words),
            RetryPolicy::from(settings),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 設定の下限で聞き取る
    pub fn listen(
        &self,
        listener: &mut dyn Listener,
        speaker: &mut dyn Speaker,
        timeout: Duration,
    ) -> ScoredAnswer {
        self.listen_with_confidence(listener, speaker, timeout, self.policy.min_confidence)
    }

    /// 最大 `max_attempts` ターン聞き取る。
    ///
    /// 下限以上・空・語数十分のいずれかで受け入れ、使い切ったら最後の書き起こしを返す。
    pub fn listen_with_confidence(
        &self,
        listener: &mut dyn Listener,
        speaker: &mut dyn Speaker,
        timeout: Duration,
        min_confidence: f32,
    ) -> ScoredAnswer {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = ScoredAnswer {
            text: String::new(),
            confidence: 0.0,
            attempts: 0,
            reason: AcceptReason::Empty,
        };

        for attempt in 1..=max_attempts {
            let text = listener.listen(timeout);
            let confidence = self.scorer.score(&text);
            log::info!("Confidence {:.2} (attempt {}/{})", confidence, attempt, max_attempts);

            let reason = if text.is_empty() {
                Some(AcceptReason::Empty)
            } else if confidence >= min_confidence {
                Some(AcceptReason::Confident)
            } else if word_count(&text) >= self.policy.lenient_word_count {
                Some(AcceptReason::Lenient)
            } else {
                None
            };

            last = ScoredAnswer {
                text,
                confidence,
                attempts: attempt,
                reason: reason.unwrap_or(AcceptReason::Exhausted),
            };
            if let Some(reason) = reason {
                if reason == AcceptReason::Lenient {
                    self.count(Metrics::inc_low_confidence_accepts);
                }
                return last;
            }

            if attempt < max_attempts {
                self.count(Metrics::inc_retries);
                if let Err(e) = speaker.speak(REPROMPT) {
                    log::warn!("Failed to speak re-prompt: {e}");
                }
            }
        }

        self.count(Metrics::inc_low_confidence_accepts);
        last
    }

    fn count(&self, f: impl FnOnce(&Metrics)) {
        if let Some(m) = &self.metrics {
            f(m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AppError;
    use std::collections::VecDeque;

    struct Scripted {
        replies: VecDeque<String>,
        calls: u32,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: replies.iter().map(|s| s.to_string()).collect(),
                calls: 0,
            }
        }
    }

    impl Listener for Scripted {
        fn listen(&mut self, _timeout: Duration) -> String {
            self.calls += 1;
            self.replies.pop_front().unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        spoken: Vec<String>,
    }

    impl Speaker for Recorder {
        fn speak(&mut self, text: &str) -> Result<(), AppError> {
            self.spoken.push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn controller(max_attempts: u32) -> RetryController {
        RetryController::new(
            ConfidenceScorer::default(),
            RetryPolicy {
                max_attempts,
                min_confidence: 0.6,
                lenient_word_count: 3,
            },
        )
    }

    #[test]
    fn confident_answer_accepted_first_try() {
        let mut l = Scripted::new(&["I have five years of experience."]);
        let mut s = Recorder::default();
        let a = controller(3).listen(&mut l, &mut s, Duration::from_secs(30));
        assert_eq!(a.reason, AcceptReason::Confident);
        assert_eq!(a.attempts, 1);
        assert!(s.spoken.is_empty());
    }

    #[test]
    fn empty_answer_is_accepted() {
        let mut l = Scripted::new(&[""]);
        let mut s = Recorder::default();
        let a = controller(3).listen(&mut l, &mut s, Duration::from_secs(30));
        assert_eq!(a.text, "");
        assert_eq!(a.reason, AcceptReason::Empty);
        assert_eq!(l.calls, 1);
    }

    #[test]
    fn lenient_word_count_accepts_low_score() {
        // 3語で信頼度 0.5 + 0.1 - 0.2 = 0.4
        let mut l = Scripted::new(&["um uh yes"]);
        let mut s = Recorder::default();
        let a = controller(3).listen(&mut l, &mut s, Duration::from_secs(30));
        assert_eq!(a.reason, AcceptReason::Lenient);
        assert!(a.confidence < 0.6);
    }

    #[test]
    fn retries_are_bounded() {
        let mut l = Scripted::new(&["um", "uh", "er", "never asked"]);
        let mut s = Recorder::default();
        let a = controller(3).listen(&mut l, &mut s, Duration::from_secs(30));
        assert_eq!(l.calls, 3);
        assert_eq!(a.attempts, 3);
        assert_eq!(a.text, "er");
        assert_eq!(a.reason, AcceptReason::Exhausted);
        // 最後の試行のあとは聞き直さない
        assert_eq!(s.spoken, vec![REPROMPT, REPROMPT]);
    }

    #[test]
    fn single_attempt_never_reprompts() {
        let mut l = Scripted::new(&["um"]);
        let mut s = Recorder::default();
        let a = controller(1).listen(&mut l, &mut s, Duration::from_secs(30));
        assert_eq!(a.text, "um");
        assert!(s.spoken.is_empty());
    }

    #[test]
    fn zero_attempts_treated_as_one() {
        let mut l = Scripted::new(&["um"]);
        let mut s = Recorder::default();
        let a = controller(0).listen(&mut l, &mut s, Duration::from_secs(30));
        assert_eq!(l.calls, 1);
        assert_eq!(a.text, "um");
    }

    #[test]
    fn metrics_count_retries() {
        let metrics = Arc::new(Metrics::new());
        let c = controller(2).with_metrics(metrics.clone());
        let mut l = Scripted::new(&["um", "uh"]);
        let mut s = Recorder::default();
        c.listen(&mut l, &mut s, Duration::from_secs(30));
        let summary = metrics.summary();
        assert_eq!(summary.retries, 1);
        assert_eq!(summary.low_confidence_accepts, 1);
    }
}
