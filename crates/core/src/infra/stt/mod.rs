mod noop;
#[cfg(feature = "vosk")]
mod vosk;

pub use noop::NoopRecognizer;
#[cfg(feature = "vosk")]
pub use self::vosk::VoskRecognizer;

use std::path::{Path, PathBuf};

use crate::domain::settings::{RecognizerChoice, RecognizerSettings};
use crate::domain::speech::{SttError, StreamingRecognizer};

/// 設定に従って認識器を生成する
pub fn create_recognizer(
    settings: &RecognizerSettings,
    sample_rate: u32,
) -> Result<Box<dyn StreamingRecognizer>, SttError> {
    match settings.engine {
        RecognizerChoice::Noop => Ok(Box::new(NoopRecognizer)),
        RecognizerChoice::Vosk => create_vosk(settings, sample_rate),
    }
}

#[cfg(feature = "vosk")]
fn create_vosk(
    settings: &RecognizerSettings,
    sample_rate: u32,
) -> Result<Box<dyn StreamingRecognizer>, SttError> {
    let model_path = match &settings.model_path {
        Some(path) => path.clone(),
        None => find_vosk_model(&settings.models_dir).ok_or_else(|| {
            SttError::engine_not_available(format!(
                "No Vosk model found under {}",
                settings.models_dir.display()
            ))
        })?,
    };
    Ok(Box::new(VoskRecognizer::new(&model_path, sample_rate)?))
}

#[cfg(not(feature = "vosk"))]
fn create_vosk(
    _settings: &RecognizerSettings,
    _sample_rate: u32,
) -> Result<Box<dyn StreamingRecognizer>, SttError> {
    Err(SttError::engine_not_available(
        "built without the `vosk` feature",
    ))
}

/// `models_dir` 直下から Vosk モデルらしきディレクトリを探す（`vosk-model*` を名前順で優先）
pub fn find_vosk_model(models_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(models_dir).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("vosk-model"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
