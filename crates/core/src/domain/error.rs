use serde::Serialize;

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_DEVICE")]
    Device,
    #[serde(rename = "E_RECOGNIZER")]
    Recognizer,
    #[serde(rename = "E_STORAGE")]
    Storage,
    #[serde(rename = "E_CONFIG")]
    Config,
    #[serde(rename = "E_ANALYZER")]
    Analyzer,
    #[serde(rename = "E_IO")]
    Io,
    #[serde(rename = "E_INTERRUPTED")]
    Interrupted,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "E_DEVICE",
            Self::Recognizer => "E_RECOGNIZER",
            Self::Storage => "E_STORAGE",
            Self::Config => "E_CONFIG",
            Self::Analyzer => "E_ANALYZER",
            Self::Io => "E_IO",
            Self::Interrupted => "E_INTERRUPTED",
            Self::Internal => "E_INTERNAL",
        }
    }
}

/// アプリケーションエラー（CLI への報告にも使う）
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    pub fn device(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Device,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn recognizer(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Recognizer,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Storage,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Config,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn analyzer(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Analyzer,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Io,
            message: msg.into(),
            recoverable: false,
        }
    }

    /// Ctrl-C などで面接が中断された
    pub fn interrupted() -> Self {
        Self {
            code: ErrorCode::Interrupted,
            message: "Interview interrupted by user".into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.code == ErrorCode::Interrupted
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}
