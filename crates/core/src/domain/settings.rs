use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::confidence::{default_filler_words, ConfidenceWeights};
use super::error::AppError;
use super::speech::CaptureConfig;

/// 面接エージェント設定。JSON ファイルから読み込み、欠けた項目はデフォルト値。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewSettings {
    pub audio: AudioSettings,
    pub listening: ListeningSettings,
    pub confidence: ConfidenceSettings,
    pub names: NameSettings,
    pub recognizer: RecognizerSettings,
    pub analyzer: AnalyzerSettings,
    pub speech_output: SpeakerSettings,
    pub script: ScriptSettings,
    pub paths: DataPaths,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    /// 1フレームのサンプル数
    pub frame_size: usize,
    /// 入力デバイス名（None = OS デフォルト）
    pub input_device: Option<String>,
    /// 発話ターンの音声を WAV で残すか
    pub keep_audio: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 1024,
            input_device: None,
            keep_audio: false,
        }
    }
}

/// ターンの種類ごとのタイムアウト (秒)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTimeouts {
    pub name_secs: u64,
    pub general_secs: u64,
    pub faq_secs: u64,
    pub confirmation_secs: u64,
    pub spelling_secs: u64,
    pub clarification_secs: u64,
}

impl Default for TurnTimeouts {
    fn default() -> Self {
        Self {
            name_secs: 35,
            general_secs: 30,
            faq_secs: 25,
            confirmation_secs: 15,
            spelling_secs: 30,
            clarification_secs: 35,
        }
    }
}

impl TurnTimeouts {
    pub fn name(&self) -> Duration {
        Duration::from_secs(self.name_secs)
    }
    pub fn general(&self) -> Duration {
        Duration::from_secs(self.general_secs)
    }
    pub fn faq(&self) -> Duration {
        Duration::from_secs(self.faq_secs)
    }
    pub fn confirmation(&self) -> Duration {
        Duration::from_secs(self.confirmation_secs)
    }
    pub fn spelling(&self) -> Duration {
        Duration::from_secs(self.spelling_secs)
    }
    pub fn clarification(&self) -> Duration {
        Duration::from_secs(self.clarification_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningSettings {
    /// 発話後この秒数を超える無音でターン確定
    pub silence_threshold_secs: f32,
    /// キュー確認の間隔
    pub poll_interval_ms: u64,
    /// キャプチャスレッド終了待ちの上限
    pub capture_join_timeout_ms: u64,
    /// 発話がないまま経過したとき「待っています」を通知する間隔
    pub patience_notice_secs: u64,
    pub timeouts: TurnTimeouts,
}

impl Default for ListeningSettings {
    fn default() -> Self {
        Self {
            silence_threshold_secs: 4.0,
            poll_interval_ms: 100,
            capture_join_timeout_ms: 2000,
            patience_notice_secs: 10,
            timeouts: TurnTimeouts::default(),
        }
    }
}

impl ListeningSettings {
    pub fn silence_threshold(&self) -> Duration {
        Duration::try_from_secs_f32(self.silence_threshold_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn capture_join_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_join_timeout_ms)
    }

    pub fn patience_notice(&self) -> Duration {
        Duration::from_secs(self.patience_notice_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSettings {
    /// これ未満の信頼度は聞き直し対象
    pub min_confidence: f32,
    /// 1回の質問で聞き取るターン数の上限
    pub max_attempts: u32,
    /// この語数以上なら信頼度が低くても受け入れる
    pub lenient_word_count: usize,
    pub weights: ConfidenceWeights,
    pub filler_words: Vec<String>,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_attempts: 1,
            lenient_word_count: 3,
            weights: ConfidenceWeights::default(),
            filler_words: default_filler_words(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameSettings {
    /// 名前を尋ねる質問の位置 (0始まり)。None なら名前確認をしない。
    pub name_question_index: Option<usize>,
    /// 組み込みフォネティック表への追加
    pub extra_letter_mappings: BTreeMap<String, char>,
}

impl Default for NameSettings {
    fn default() -> Self {
        Self {
            name_question_index: Some(0),
            extra_letter_mappings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerChoice {
    Vosk,
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    pub engine: RecognizerChoice,
    /// Vosk モデルディレクトリ。None なら models_dir から探す。
    pub model_path: Option<PathBuf>,
    pub models_dir: PathBuf,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            engine: RecognizerChoice::Vosk,
            model_path: None,
            models_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerChoice {
    Keyword,
    Claude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub backend: AnalyzerChoice,
    pub model: String,
    /// None なら環境変数 ANTHROPIC_API_KEY
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            backend: AnalyzerChoice::Keyword,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerChoice {
    /// 標準出力に表示するだけ
    Console,
    /// say / espeak などの外部コマンドで読み上げ
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerSettings {
    pub backend: SpeakerChoice,
    /// None なら macOS は say、それ以外は espeak
    pub command: Option<String>,
    /// 読み上げ速度 (words per minute)
    pub rate: u32,
}

impl Default for SpeakerSettings {
    fn default() -> Self {
        Self {
            backend: SpeakerChoice::Console,
            command: None,
            rate: 150,
        }
    }
}

pub fn default_questions() -> Vec<String> {
    [
        "Please tell me your full name and a bit about your background.",
        "Why are you interested in joining LunarTech?",
        "Could you describe your experience in Data Science and AI?",
        "What are your goals for the next two years?",
        "Are you ready to start immediately? If not, when?",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    pub organization: String,
    pub questions: Vec<String>,
    /// FAQ ループの最大往復数
    pub max_faq_rounds: usize,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            organization: "LunarTech".to_string(),
            questions: default_questions(),
            max_faq_rounds: 10,
        }
    }
}

/// 出力先。すべて data_dir 配下。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub data_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl DataPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir.join("transcripts")
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.data_dir.join("summaries")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn database(&self) -> PathBuf {
        self.data_dir.join("interviews.db")
    }

    pub fn faq_file(&self) -> PathBuf {
        self.data_dir.join("faq.json")
    }

    pub fn dashboard(&self) -> PathBuf {
        self.data_dir.join("dashboard.html")
    }

    pub fn session_log(&self) -> PathBuf {
        self.data_dir.join("session_logs.log")
    }

    /// 出力ディレクトリをまとめて作成
    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        for dir in [
            self.data_dir.clone(),
            self.transcripts_dir(),
            self.summaries_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::io(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }
}

impl InterviewSettings {
    /// JSON 設定ファイルを読み込む
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|e| {
            AppError::config(format!("Invalid settings in {}: {e}", path.display()))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.audio.sample_rate == 0 {
            return Err(AppError::config("audio.sample_rate must be positive"));
        }
        if self.audio.frame_size == 0 {
            return Err(AppError::config("audio.frame_size must be positive"));
        }
        let silence = self.listening.silence_threshold_secs;
        if !silence.is_finite() || silence <= 0.0 {
            return Err(AppError::config(
                "listening.silence_threshold_secs must be a positive finite number",
            ));
        }
        if self.listening.poll_interval_ms == 0 {
            return Err(AppError::config("listening.poll_interval_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&self.confidence.min_confidence) {
            return Err(AppError::config(
                "confidence.min_confidence must be between 0 and 1",
            ));
        }
        if self.confidence.max_attempts == 0 {
            return Err(AppError::config("confidence.max_attempts must be at least 1"));
        }
        if self.script.questions.is_empty() {
            return Err(AppError::config("script.questions must not be empty"));
        }
        if let Some(idx) = self.names.name_question_index {
            if idx >= self.script.questions.len() {
                return Err(AppError::config(format!(
                    "names.name_question_index {idx} is out of range"
                )));
            }
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.audio.sample_rate,
            channels: 1,
            frame_size: self.audio.frame_size,
        }
    }
}
