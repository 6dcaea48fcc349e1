use serde::Serialize;
use std::time::{Duration, Instant};

use super::speech::RecognitionEvent;

/// 無音判定とハード上限の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    /// 最後の発話からこの時間を超えて無音なら確定
    pub silence_threshold: Duration,
    /// ターン全体の上限。無音判定より優先される。
    pub max_duration: Duration,
}

/// ターンの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    WaitingForSpeech,
    SpeechDetected,
    Finalizing,
    Done,
}

/// ターン終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// 発話後の無音が閾値を超えた
    Silence,
    /// 発話中にハード上限に達した
    MaxDuration,
    /// 一度も発話がないままタイムアウト
    NoSpeech,
    /// キャプチャ側が先に終了した
    CaptureEnded,
    /// 認識器がエラーを返した
    RecognizerFailed,
    /// 外部から中断された
    Cancelled,
}

/// 無音ベースの発話終端検出（純粋な状態機械、時刻は呼び出し側が渡す）
///
/// 認識テキストは常に最新の非空セグメントで置き換える。連結はしない。
#[derive(Debug, Clone)]
pub struct Endpointer {
    config: EndpointConfig,
    state: EndpointState,
    turn_start: Instant,
    last_speech: Option<Instant>,
    accumulated_text: String,
    last_hypothesis: String,
    end_reason: Option<EndReason>,
}

impl Endpointer {
    pub fn new(config: EndpointConfig, turn_start: Instant) -> Self {
        Self {
            config,
            state: EndpointState::WaitingForSpeech,
            turn_start,
            last_speech: None,
            accumulated_text: String::new(),
            last_hypothesis: String::new(),
            end_reason: None,
        }
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn has_speech(&self) -> bool {
        self.last_speech.is_some()
    }

    pub fn last_speech(&self) -> Option<Instant> {
        self.last_speech
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn turn_start(&self) -> Instant {
        self.turn_start
    }

    fn is_listening(&self) -> bool {
        matches!(
            self.state,
            EndpointState::WaitingForSpeech | EndpointState::SpeechDetected
        )
    }

    /// 認識イベントを反映する。テキストが更新された場合 true。
    ///
    /// 同じ Partial の繰り返し（無音中の認識器が返す）は発話とみなさない。
    pub fn on_event(&mut self, event: &RecognitionEvent, now: Instant) -> bool {
        if !self.is_listening() {
            return false;
        }
        let text = event.text().trim();
        if text.is_empty() {
            return false;
        }
        if !event.is_final() && text == self.last_hypothesis {
            return false;
        }

        self.last_hypothesis = text.to_string();
        self.accumulated_text = text.to_string();
        self.last_speech = Some(match self.last_speech {
            Some(prev) => prev.max(now),
            None => now,
        });
        self.state = EndpointState::SpeechDetected;
        true
    }

    /// タイムアウトを判定する。Finalizing に遷移したらその理由を返す。
    pub fn poll(&mut self, now: Instant) -> Option<EndReason> {
        let elapsed = now.saturating_duration_since(self.turn_start);
        let reason = match self.state {
            EndpointState::WaitingForSpeech => {
                if elapsed >= self.config.max_duration {
                    Some(EndReason::NoSpeech)
                } else {
                    None
                }
            }
            EndpointState::SpeechDetected => {
                let silent_for = self
                    .last_speech
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or_default();
                if elapsed >= self.config.max_duration {
                    Some(EndReason::MaxDuration)
                } else if silent_for > self.config.silence_threshold {
                    Some(EndReason::Silence)
                } else {
                    None
                }
            }
            EndpointState::Finalizing | EndpointState::Done => None,
        };

        if let Some(r) = reason {
            self.begin_finalizing(r);
        }
        reason
    }

    /// 外部要因（キャプチャ終了、中断、認識エラー）で確定に入る。
    pub fn interrupt(&mut self, reason: EndReason) {
        if self.is_listening() {
            self.begin_finalizing(reason);
        }
    }

    fn begin_finalizing(&mut self, reason: EndReason) {
        self.state = EndpointState::Finalizing;
        self.end_reason = Some(reason);
    }

    /// 認識器の最終結果をマージしてターンを閉じる。
    ///
    /// 非空の最終結果は蓄積テキストを置き換える。戻り値は trim 済み（空の場合あり）。
    pub fn finish(&mut self, flushed: Option<&RecognitionEvent>) -> String {
        if let Some(event) = flushed {
            if !event.is_empty() {
                self.accumulated_text = event.text().to_string();
            }
        }
        if self.end_reason.is_none() {
            self.end_reason = Some(if self.has_speech() {
                EndReason::Silence
            } else {
                EndReason::NoSpeech
            });
        }
        self.state = EndpointState::Done;
        self.accumulated_text.trim().to_string()
    }

    /// 認識失敗時：テキストを捨てて空で閉じる
    pub fn abandon(&mut self) -> String {
        self.accumulated_text.clear();
        self.end_reason = Some(EndReason::RecognizerFailed);
        self.state = EndpointState::Done;
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EndpointConfig {
        EndpointConfig {
            silence_threshold: Duration::from_secs(4),
            max_duration: Duration::from_secs(30),
        }
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    fn partial(t: &str) -> RecognitionEvent {
        RecognitionEvent::Partial(t.into())
    }

    fn final_(t: &str) -> RecognitionEvent {
        RecognitionEvent::Final(t.into())
    }

    #[test]
    fn starts_waiting_without_speech() {
        let ep = Endpointer::new(config(), Instant::now());
        assert_eq!(ep.state(), EndpointState::WaitingForSpeech);
        assert!(!ep.has_speech());
        assert_eq!(ep.text(), "");
    }

    #[test]
    fn empty_events_do_not_count_as_speech() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        assert!(!ep.on_event(&partial(""), at(base, 100)));
        assert!(!ep.on_event(&final_("   "), at(base, 200)));
        assert_eq!(ep.state(), EndpointState::WaitingForSpeech);
    }

    #[test]
    fn first_speech_moves_to_speech_detected() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        assert!(ep.on_event(&partial("hello"), at(base, 500)));
        assert_eq!(ep.state(), EndpointState::SpeechDetected);
        assert_eq!(ep.last_speech(), Some(at(base, 500)));
    }

    #[test]
    fn segments_replace_instead_of_append() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&final_("my name is"), at(base, 500));
        ep.on_event(&final_("john smith"), at(base, 1500));
        assert_eq!(ep.text(), "john smith");
        assert_eq!(ep.finish(None), "john smith");
    }

    #[test]
    fn repeated_partial_does_not_refresh_last_speech() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&partial("hello"), at(base, 100));
        assert!(!ep.on_event(&partial("hello"), at(base, 3000)));
        assert_eq!(ep.last_speech(), Some(at(base, 100)));
        assert!(ep.on_event(&partial("hello there"), at(base, 3100)));
        assert_eq!(ep.last_speech(), Some(at(base, 3100)));
    }

    #[test]
    fn silence_uses_strict_threshold() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&partial("hi"), at(base, 1000));
        assert_eq!(ep.poll(at(base, 5000)), None);
        assert_eq!(ep.poll(at(base, 5100)), Some(EndReason::Silence));
        assert_eq!(ep.state(), EndpointState::Finalizing);
    }

    #[test]
    fn never_finalizes_before_threshold() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&partial("hi"), base);
        for ms in (0..=4000).step_by(100) {
            assert_eq!(ep.poll(at(base, ms)), None, "finalized early at {ms}ms");
        }
    }

    #[test]
    fn no_speech_ends_at_timeout() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        assert_eq!(ep.poll(at(base, 29_900)), None);
        assert_eq!(ep.poll(at(base, 30_000)), Some(EndReason::NoSpeech));
        assert_eq!(ep.finish(None), "");
    }

    #[test]
    fn hard_ceiling_takes_priority_over_silence() {
        let base = Instant::now();
        let cfg = EndpointConfig {
            silence_threshold: Duration::from_secs(4),
            max_duration: Duration::from_secs(2),
        };
        let mut ep = Endpointer::new(cfg, base);
        for ms in (0..2000).step_by(100) {
            ep.on_event(&partial(&format!("word {ms}")), at(base, ms));
            assert_eq!(ep.poll(at(base, ms)), None);
        }
        assert_eq!(ep.poll(at(base, 2000)), Some(EndReason::MaxDuration));
    }

    #[test]
    fn events_ignored_after_finalizing() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&partial("first"), base);
        ep.interrupt(EndReason::Cancelled);
        assert!(!ep.on_event(&partial("second"), at(base, 100)));
        assert_eq!(ep.end_reason(), Some(EndReason::Cancelled));
        assert_eq!(ep.finish(None), "first");
    }

    #[test]
    fn finish_merges_non_empty_final() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&partial("i am ready"), base);
        ep.poll(at(base, 4100));
        assert_eq!(ep.finish(Some(&final_("  i am ready to start  "))), "i am ready to start");
        assert_eq!(ep.state(), EndpointState::Done);
    }

    #[test]
    fn finish_keeps_text_when_final_is_empty() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&final_("yes"), base);
        assert_eq!(ep.finish(Some(&final_(""))), "yes");
    }

    #[test]
    fn abandon_returns_empty() {
        let base = Instant::now();
        let mut ep = Endpointer::new(config(), base);
        ep.on_event(&final_("something"), base);
        assert_eq!(ep.abandon(), "");
        assert_eq!(ep.end_reason(), Some(EndReason::RecognizerFailed));
    }
}
