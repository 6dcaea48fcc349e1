use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::capture::{AudioDevice, AudioSource};
use super::recorder::TurnRecorder;
use crate::domain::endpoint::{EndReason, EndpointConfig, Endpointer};
use crate::domain::settings::ListeningSettings;
use crate::domain::speech::{
    AudioFrame, CaptureConfig, Listener, RecognitionEvent, StreamingRecognizer,
};
use crate::infra::clock::{Clock, SystemClock};
use crate::infra::metrics::Metrics;

/// ターンの進行イベント（CLI の表示に変換される）
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// 聞き取り開始
    Listening { turn_id: Uuid, timeout: Duration },
    /// 暫定の認識結果
    Partial(String),
    /// 確定した認識セグメント
    Heard(String),
    /// 発話がないまま一定時間経過
    StillWaiting { elapsed: Duration },
    /// 終端検出
    Finalizing(EndReason),
    /// ターン完了
    Completed {
        text: String,
        reason: EndReason,
        duration: Duration,
    },
    /// 認識エラー（ターンは空で終わる）
    Error(String),
}

/// ターンループの設定
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub silence_threshold: Duration,
    pub poll_interval: Duration,
    pub join_timeout: Duration,
    pub patience_notice: Duration,
}

impl From<&ListeningSettings> for TurnSettings {
    fn from(s: &ListeningSettings) -> Self {
        Self {
            silence_threshold: s.silence_threshold(),
            poll_interval: s.poll_interval(),
            join_timeout: s.capture_join_timeout(),
            patience_notice: s.patience_notice(),
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from(&ListeningSettings::default())
    }
}

/// 1ターンの結果
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn_id: Uuid,
    /// trim 済みの認識テキスト（空の場合あり）
    pub text: String,
    pub reason: EndReason,
    pub duration: Duration,
    pub had_speech: bool,
    pub frames: usize,
    pub audio_path: Option<PathBuf>,
}

// ─── Turn ────────────────────────────────────────────────────────

/// キューを一定間隔でポーリングし、認識器と終端検出器を回す。
///
/// `listen` で Finalizing まで進め、呼び出し側がキャプチャを止めてから `finish` で確定させる。
pub struct Turn<'a> {
    turn_id: Uuid,
    timeout: Duration,
    recognizer: &'a mut dyn StreamingRecognizer,
    clock: &'a dyn Clock,
    events: Option<&'a mpsc::Sender<TurnEvent>>,
    endpointer: Endpointer,
    frames: usize,
    failed: bool,
}

impl<'a> Turn<'a> {
    /// 認識器をリセットしてターンを開始する
    pub fn begin(
        recognizer: &'a mut dyn StreamingRecognizer,
        clock: &'a dyn Clock,
        endpoint: EndpointConfig,
    ) -> Self {
        recognizer.reset();
        Self {
            turn_id: Uuid::new_v4(),
            timeout: endpoint.max_duration,
            recognizer,
            clock,
            events: None,
            endpointer: Endpointer::new(endpoint, clock.now()),
            frames: 0,
            failed: false,
        }
    }

    pub fn with_events(mut self, events: Option<&'a mpsc::Sender<TurnEvent>>) -> Self {
        self.events = events;
        self
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }

    /// 終端を検出するまでキューを処理する
    pub fn listen(
        &mut self,
        frames: &mpsc::Receiver<AudioFrame>,
        settings: &TurnSettings,
        cancel: &AtomicBool,
        mut on_frame: impl FnMut(&AudioFrame),
    ) -> EndReason {
        let start = self.endpointer.turn_start();
        let mut last_notice = start;
        self.emit(TurnEvent::Listening {
            turn_id: self.turn_id,
            timeout: self.timeout,
        });

        loop {
            if cancel.load(Ordering::Relaxed) {
                self.endpointer.interrupt(EndReason::Cancelled);
                break;
            }
            if self.drain(frames, &mut on_frame) {
                break;
            }

            let now = self.clock.now();
            if self.endpointer.poll(now).is_some() {
                break;
            }
            if !self.endpointer.has_speech()
                && now.saturating_duration_since(last_notice) >= settings.patience_notice
            {
                last_notice = now;
                self.emit(TurnEvent::StillWaiting {
                    elapsed: now.saturating_duration_since(start),
                });
            }
            self.clock.sleep(settings.poll_interval);
        }

        let reason = self.endpointer.end_reason().unwrap_or(EndReason::NoSpeech);
        self.emit(TurnEvent::Finalizing(reason));
        reason
    }

    /// キューに溜まったフレームをすべて認識器へ流す。ターンを打ち切るべきなら true。
    fn drain(
        &mut self,
        frames: &mpsc::Receiver<AudioFrame>,
        on_frame: &mut impl FnMut(&AudioFrame),
    ) -> bool {
        loop {
            match frames.try_recv() {
                Ok(frame) => {
                    self.frames += 1;
                    on_frame(&frame);
                    match self.recognizer.accept(&frame) {
                        Ok(event) => self.apply(&event),
                        Err(e) => {
                            log::error!("Recognizer error ({}): {}", self.recognizer.name(), e);
                            self.emit(TurnEvent::Error(e.to_string()));
                            self.failed = true;
                            self.endpointer.interrupt(EndReason::RecognizerFailed);
                            return true;
                        }
                    }
                }
                Err(mpsc::TryRecvError::Empty) => return false,
                Err(mpsc::TryRecvError::Disconnected) => {
                    log::debug!("Capture queue closed");
                    self.endpointer.interrupt(EndReason::CaptureEnded);
                    return true;
                }
            }
        }
    }

    fn apply(&mut self, event: &RecognitionEvent) {
        if self.endpointer.on_event(event, self.clock.now()) {
            let text = event.text().trim().to_string();
            self.emit(match event {
                RecognitionEvent::Partial(_) => TurnEvent::Partial(text),
                RecognitionEvent::Final(_) => TurnEvent::Heard(text),
            });
        }
    }

    /// 認識器の残りを確定させてターンを閉じる。キャプチャ停止後に呼ぶ。
    pub fn finish(mut self) -> TurnOutcome {
        let text = if self.failed {
            self.endpointer.abandon()
        } else {
            match self.recognizer.finalize() {
                Ok(event) => self.endpointer.finish(Some(&event)),
                Err(e) => {
                    log::error!("Recognizer finalize failed ({}): {}", self.recognizer.name(), e);
                    self.emit(TurnEvent::Error(e.to_string()));
                    self.endpointer.abandon()
                }
            }
        };

        let reason = self.endpointer.end_reason().unwrap_or(EndReason::NoSpeech);
        let duration = self
            .clock
            .now()
            .saturating_duration_since(self.endpointer.turn_start());
        self.emit(TurnEvent::Completed {
            text: text.clone(),
            reason,
            duration,
        });

        TurnOutcome {
            turn_id: self.turn_id,
            text,
            reason,
            duration,
            had_speech: self.endpointer.has_speech(),
            frames: self.frames,
            audio_path: None,
        }
    }
}

// ─── SpeechListener ──────────────────────────────────────────────

/// マイク → 認識器 → 終端検出 で1回の発話を聞き取る。
///
/// デバイスと認識器はエージェントの生存期間中保持し、ストリームとキャプチャスレッドはターンごと。
pub struct SpeechListener {
    device: Arc<dyn AudioDevice>,
    recognizer: Box<dyn StreamingRecognizer>,
    capture: CaptureConfig,
    settings: TurnSettings,
    clock: Arc<dyn Clock>,
    cancel: Arc<AtomicBool>,
    events: Option<mpsc::Sender<TurnEvent>>,
    recorder: Option<TurnRecorder>,
    metrics: Option<Arc<Metrics>>,
}

impl SpeechListener {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        recognizer: Box<dyn StreamingRecognizer>,
        capture: CaptureConfig,
        settings: TurnSettings,
    ) -> Self {
        Self {
            device,
            recognizer,
            capture,
            settings,
            clock: Arc::new(SystemClock),
            cancel: Arc::new(AtomicBool::new(false)),
            events: None,
            recorder: None,
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 中断フラグを共有する。立つと実行中のターンは次のティックで確定する。
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<TurnEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_recorder(mut self, recorder: TurnRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 1ターン聞き取る。失敗はすべてログに残し、空テキストとして返す。
    pub fn run_turn(&mut self, timeout: Duration) -> TurnOutcome {
        let started = Instant::now();
        let endpoint = EndpointConfig {
            silence_threshold: self.settings.silence_threshold,
            max_duration: timeout,
        };

        let mut source = AudioSource::start(self.device.clone(), self.capture);
        let mut turn = Turn::begin(self.recognizer.as_mut(), self.clock.as_ref(), endpoint)
            .with_events(self.events.as_ref());
        let recorder = &mut self.recorder;
        turn.listen(source.frames(), &self.settings, &self.cancel, |frame| {
            if let Some(rec) = recorder.as_mut() {
                rec.push(frame);
            }
        });
        source.stop(self.settings.join_timeout);
        drop(source);
        let mut outcome = turn.finish();

        if let Some(rec) = self.recorder.as_mut() {
            if outcome.had_speech {
                match rec.flush(outcome.turn_id) {
                    Ok(path) => outcome.audio_path = path,
                    Err(e) => log::warn!("Failed to save turn audio: {}", e),
                }
            } else {
                rec.clear();
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_turns();
            if outcome.text.is_empty() {
                metrics.inc_empty_turns();
            }
            if outcome.reason == EndReason::RecognizerFailed {
                metrics.inc_error("E_RECOGNIZER");
            }
            metrics.record_latency("listen", started.elapsed().as_millis() as u64);
        }

        log::info!(
            "Turn {} ended ({:?}) after {}ms, {} frames: {:?}",
            outcome.turn_id,
            outcome.reason,
            outcome.duration.as_millis(),
            outcome.frames,
            outcome.text
        );
        outcome
    }
}

impl Listener for SpeechListener {
    fn listen(&mut self, timeout: Duration) -> String {
        self.run_turn(timeout).text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::speech::SttError;
    use crate::infra::clock::ManualClock;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// accept ごとに台本のイベントを返す認識器
    struct ScriptedRecognizer {
        script: VecDeque<Result<RecognitionEvent, SttError>>,
        final_text: String,
        resets: usize,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<RecognitionEvent>, final_text: &str) -> Self {
            Self {
                script: script.into_iter().map(Ok).collect(),
                final_text: final_text.into(),
                resets: 0,
            }
        }
    }

    impl StreamingRecognizer for ScriptedRecognizer {
        fn reset(&mut self) {
            self.resets += 1;
        }

        fn accept(&mut self, _frame: &AudioFrame) -> Result<RecognitionEvent, SttError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(RecognitionEvent::Partial(String::new())))
        }

        fn finalize(&mut self) -> Result<RecognitionEvent, SttError> {
            Ok(RecognitionEvent::Final(self.final_text.clone()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// sleep で時間を進め、その時刻までに予定されたフレームをキューへ送る時計
    struct FeedingClock {
        clock: ManualClock,
        schedule: Mutex<VecDeque<Duration>>,
        tx: Mutex<Option<mpsc::Sender<AudioFrame>>>,
        close_when_done: bool,
    }

    impl FeedingClock {
        fn new(times_ms: &[u64], close_when_done: bool) -> (Self, mpsc::Receiver<AudioFrame>) {
            let (tx, rx) = mpsc::channel();
            let clock = Self {
                clock: ManualClock::new(),
                schedule: Mutex::new(times_ms.iter().map(|&ms| Duration::from_millis(ms)).collect()),
                tx: Mutex::new(Some(tx)),
                close_when_done,
            };
            clock.feed();
            (clock, rx)
        }

        fn feed(&self) {
            let now = self.clock.elapsed();
            let mut schedule = self.schedule.lock();
            let mut tx = self.tx.lock();
            while schedule.front().is_some_and(|t| *t <= now) {
                schedule.pop_front();
                if let Some(sender) = tx.as_ref() {
                    let _ = sender.send(AudioFrame::new(vec![0; 160], 16000));
                }
            }
            if schedule.is_empty() && self.close_when_done {
                tx.take();
            }
        }
    }

    impl Clock for FeedingClock {
        fn now(&self) -> Instant {
            self.clock.now()
        }

        fn sleep(&self, duration: Duration) {
            self.clock.advance(duration);
            self.feed();
        }
    }

    fn settings() -> TurnSettings {
        TurnSettings {
            silence_threshold: Duration::from_secs(4),
            poll_interval: Duration::from_millis(100),
            join_timeout: Duration::from_millis(100),
            patience_notice: Duration::from_secs(10),
        }
    }

    fn endpoint(timeout_secs: u64) -> EndpointConfig {
        EndpointConfig {
            silence_threshold: Duration::from_secs(4),
            max_duration: Duration::from_secs(timeout_secs),
        }
    }

    fn partial(t: &str) -> RecognitionEvent {
        RecognitionEvent::Partial(t.into())
    }

    fn final_(t: &str) -> RecognitionEvent {
        RecognitionEvent::Final(t.into())
    }

    fn run(
        recognizer: &mut ScriptedRecognizer,
        clock: &FeedingClock,
        frames: &mpsc::Receiver<AudioFrame>,
        timeout_secs: u64,
        cancel: &AtomicBool,
    ) -> TurnOutcome {
        let mut turn = Turn::begin(recognizer, clock, endpoint(timeout_secs));
        turn.listen(frames, &settings(), cancel, |_| {});
        turn.finish()
    }

    #[test]
    fn finalizes_after_silence_threshold() {
        let (clock, rx) = FeedingClock::new(&[500, 1000, 1500], false);
        let mut rec = ScriptedRecognizer::new(
            vec![partial("hello"), partial("hello world"), final_("hello world")],
            "",
        );
        let out = run(&mut rec, &clock, &rx, 30, &AtomicBool::new(false));
        assert_eq!(out.reason, EndReason::Silence);
        assert_eq!(out.text, "hello world");
        assert!(out.duration > Duration::from_millis(5500));
        assert!(out.duration <= Duration::from_millis(5600));
        assert_eq!(out.frames, 3);
    }

    #[test]
    fn hard_ceiling_wins_over_continuous_speech() {
        let times: Vec<u64> = (0..50).map(|i| i * 100).collect();
        let script = (0..50).map(|i| partial(&format!("word {i}"))).collect();
        let (clock, rx) = FeedingClock::new(&times, false);
        let mut rec = ScriptedRecognizer::new(script, "");
        let out = run(&mut rec, &clock, &rx, 2, &AtomicBool::new(false));
        assert_eq!(out.reason, EndReason::MaxDuration);
        assert_eq!(out.duration, Duration::from_secs(2));
        assert_eq!(out.text, "word 20");
    }

    #[test]
    fn no_speech_returns_empty_at_timeout() {
        let (clock, rx) = FeedingClock::new(&[100, 200], false);
        let mut rec = ScriptedRecognizer::new(vec![partial(""), partial("")], "");
        let out = run(&mut rec, &clock, &rx, 1, &AtomicBool::new(false));
        assert_eq!(out.reason, EndReason::NoSpeech);
        assert_eq!(out.text, "");
        assert!(!out.had_speech);
        assert_eq!(out.duration, Duration::from_secs(1));
    }

    #[test]
    fn later_segment_replaces_earlier() {
        let (clock, rx) = FeedingClock::new(&[100, 900], false);
        let mut rec = ScriptedRecognizer::new(vec![final_("my name is"), final_("john")], "");
        let out = run(&mut rec, &clock, &rx, 30, &AtomicBool::new(false));
        assert_eq!(out.text, "john");
    }

    #[test]
    fn finalize_result_is_merged() {
        let (clock, rx) = FeedingClock::new(&[100], false);
        let mut rec = ScriptedRecognizer::new(vec![partial("john")], " john smith ");
        let out = run(&mut rec, &clock, &rx, 30, &AtomicBool::new(false));
        assert_eq!(out.text, "john smith");
    }

    #[test]
    fn recognizer_error_yields_empty_transcript() {
        let (clock, rx) = FeedingClock::new(&[100, 200], false);
        let mut rec = ScriptedRecognizer::new(vec![partial("hello")], "hello");
        rec.script
            .push_back(Err(SttError::recognition_failed("decoder crashed")));
        let out = run(&mut rec, &clock, &rx, 30, &AtomicBool::new(false));
        assert_eq!(out.reason, EndReason::RecognizerFailed);
        assert_eq!(out.text, "");
    }

    #[test]
    fn closed_queue_finalizes_immediately() {
        let (clock, rx) = FeedingClock::new(&[100, 200], true);
        let mut rec = ScriptedRecognizer::new(vec![partial("yes"), final_("yes")], "");
        let out = run(&mut rec, &clock, &rx, 30, &AtomicBool::new(false));
        assert_eq!(out.reason, EndReason::CaptureEnded);
        assert_eq!(out.text, "yes");
        assert!(out.duration < Duration::from_secs(1));
    }

    #[test]
    fn cancel_flag_stops_turn() {
        let (clock, rx) = FeedingClock::new(&[], false);
        let mut rec = ScriptedRecognizer::new(vec![], "");
        let out = run(&mut rec, &clock, &rx, 30, &AtomicBool::new(true));
        assert_eq!(out.reason, EndReason::Cancelled);
        assert_eq!(out.duration, Duration::ZERO);
    }

    #[test]
    fn recognizer_is_reset_per_turn() {
        let (clock, rx) = FeedingClock::new(&[], false);
        let mut rec = ScriptedRecognizer::new(vec![], "");
        let cancel = AtomicBool::new(true);
        run(&mut rec, &clock, &rx, 1, &cancel);
        run(&mut rec, &clock, &rx, 1, &cancel);
        assert_eq!(rec.resets, 2);
    }

    #[test]
    fn emits_progress_events() {
        let (clock, rx) = FeedingClock::new(&[100, 200], false);
        let mut rec = ScriptedRecognizer::new(vec![partial("hi"), final_("hi there")], "");
        let (tx, events) = mpsc::channel();
        let mut turn = Turn::begin(&mut rec, &clock, endpoint(30)).with_events(Some(&tx));
        turn.listen(&rx, &settings(), &AtomicBool::new(false), |_| {});
        turn.finish();
        drop(tx);

        let events: Vec<TurnEvent> = events.into_iter().collect();
        assert!(matches!(events.first(), Some(TurnEvent::Listening { .. })));
        assert!(events.contains(&TurnEvent::Partial("hi".into())));
        assert!(events.contains(&TurnEvent::Heard("hi there".into())));
        assert!(events.contains(&TurnEvent::Finalizing(EndReason::Silence)));
        assert!(matches!(
            events.last(),
            Some(TurnEvent::Completed { text, reason: EndReason::Silence, .. }) if text == "hi there"
        ));
    }

    #[test]
    fn still_waiting_notice_while_silent() {
        let (clock, rx) = FeedingClock::new(&[], false);
        let mut rec = ScriptedRecognizer::new(vec![], "");
        let (tx, events) = mpsc::channel();
        let mut turn = Turn::begin(&mut rec, &clock, endpoint(25)).with_events(Some(&tx));
        turn.listen(&rx, &settings(), &AtomicBool::new(false), |_| {});
        turn.finish();
        drop(tx);

        let notices = events
            .into_iter()
            .filter(|e| matches!(e, TurnEvent::StillWaiting { .. }))
            .count();
        assert_eq!(notices, 2);
    }
}
