use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── AudioFrame ──────────────────────────────────────────────────

/// 固定長の mono PCM16 フレーム。キャプチャ後は不変。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// f32 (-1.0〜1.0) サンプルから PCM16 フレームを作る。範囲外はクリップ。
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let pcm = samples
            .iter()
            .map(|&s| (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();
        Self::new(pcm, sample_rate)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ─── CaptureConfig ───────────────────────────────────────────────

/// キャプチャ設定。認識器に渡るフレームはこの形式に揃える。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// サンプルレート (Hz)。Vosk 用に 16000 を標準とする。
    pub sample_rate: u32,
    /// 出力チャンネル数 (常に 1 = mono)
    pub channels: u16,
    /// 1フレームあたりのサンプル数
    pub frame_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            frame_size: 1024,
        }
    }
}

// ─── RecognitionEvent ────────────────────────────────────────────

/// ストリーミング認識器が1フレームごとに返す結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// 暫定仮説。後続フレームで書き換わる。
    Partial(String),
    /// 認識セグメントの確定。ターンの終了ではない。
    Final(String),
}

impl RecognitionEvent {
    pub fn text(&self) -> &str {
        match self {
            Self::Partial(t) | Self::Final(t) => t,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    /// 空白のみのテキストも空とみなす
    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

// ─── SttError ────────────────────────────────────────────────────

/// 音声認識で発生するエラー。
#[derive(Debug, Clone)]
pub struct SttError {
    /// エラー種別
    pub kind: SttErrorKind,
    /// 人間が読める詳細メッセージ
    pub detail: String,
    /// 次のターンで回復しうるかどうか
    pub recoverable: bool,
}

impl std::fmt::Display for SttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SttError::{:?}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for SttError {}

/// 認識エラー種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SttErrorKind {
    /// フレームのフォーマットが不正/非対応
    AudioFormat,
    /// エンジンが利用不可 (feature 無効、モデル未検出等)
    EngineNotAvailable,
    /// 認識処理中のエラー
    RecognitionFailed,
}

impl SttError {
    pub fn audio_format(detail: impl Into<String>) -> Self {
        Self { kind: SttErrorKind::AudioFormat, detail: detail.into(), recoverable: false }
    }

    pub fn engine_not_available(detail: impl Into<String>) -> Self {
        Self { kind: SttErrorKind::EngineNotAvailable, detail: detail.into(), recoverable: false }
    }

    pub fn recognition_failed(detail: impl Into<String>) -> Self {
        Self { kind: SttErrorKind::RecognitionFailed, detail: detail.into(), recoverable: true }
    }
}

// ─── StreamingRecognizer trait ───────────────────────────────────

/// ストリーミング認識器のコアトレイト。
///
/// 1ターンの間はターンループのスレッドだけが触る。ターン開始時に必ず `reset` される。
pub trait StreamingRecognizer: Send {
    /// 内部状態を破棄する。
    fn reset(&mut self);

    /// 1フレームを投入し、その時点の Partial か Final を返す。
    fn accept(&mut self, frame: &AudioFrame) -> Result<RecognitionEvent, SttError>;

    /// 残りの音声を確定させる。常に Final (空の場合あり) を返す。
    fn finalize(&mut self) -> Result<RecognitionEvent, SttError>;

    /// エンジン名 (例: "vosk", "noop")。
    fn name(&self) -> &str;
}

// ─── Listener trait ──────────────────────────────────────────────

/// 1回の発話を聞き取ってテキストを返す。失敗しても空文字列を返し、エラーにしない。
pub trait Listener: Send {
    fn listen(&mut self, timeout: Duration) -> String;
}

// ─── Tests ───────────────────────────────────────────────────────
