use std::path::Path;

use vosk::{CompleteResult, DecodingState, Model, Recognizer};

use crate::domain::speech::{AudioFrame, RecognitionEvent, SttError, StreamingRecognizer};

/// Vosk (Kaldi) によるオフラインのストリーミング認識
pub struct VoskRecognizer {
    // Recognizer より長く生きる必要がある
    _model: Model,
    recognizer: Recognizer,
    sample_rate: u32,
}

impl VoskRecognizer {
    pub fn new(model_path: &Path, sample_rate: u32) -> Result<Self, SttError> {
        let path = model_path.to_str().ok_or_else(|| {
            SttError::engine_not_available(format!("Invalid model path: {}", model_path.display()))
        })?;
        let model = Model::new(path).ok_or_else(|| {
            SttError::engine_not_available(format!("Failed to load Vosk model: {path}"))
        })?;
        let recognizer = Recognizer::new(&model, sample_rate as f32).ok_or_else(|| {
            SttError::engine_not_available("Failed to create Vosk recognizer")
        })?;
        log::info!("Vosk model loaded: {} ({} Hz)", path, sample_rate);
        Ok(Self {
            _model: model,
            recognizer,
            sample_rate,
        })
    }

    fn complete_text(result: CompleteResult<'_>) -> String {
        match result {
            CompleteResult::Single(single) => single.text.to_string(),
            CompleteResult::Multiple(multi) => multi
                .alternatives
                .first()
                .map(|alt| alt.text.to_string())
                .unwrap_or_default(),
        }
    }
}

impl StreamingRecognizer for VoskRecognizer {
    fn reset(&mut self) {
        self.recognizer.reset();
    }

    fn accept(&mut self, frame: &AudioFrame) -> Result<RecognitionEvent, SttError> {
        if frame.sample_rate() != self.sample_rate {
            return Err(SttError::audio_format(format!(
                "Expected {} Hz, got {} Hz",
                self.sample_rate,
                frame.sample_rate()
            )));
        }
        let state = self
            .recognizer
            .accept_waveform(frame.samples())
            .map_err(|e| SttError::recognition_failed(format!("{e:?}")))?;
        match state {
            DecodingState::Finalized => Ok(RecognitionEvent::Final(Self::complete_text(
                self.recognizer.result(),
            ))),
            DecodingState::Running => Ok(RecognitionEvent::Partial(
                self.recognizer.partial_result().partial.to_string(),
            )),
            DecodingState::Failed => Err(SttError::recognition_failed("Vosk decoding failed")),
        }
    }

    fn finalize(&mut self) -> Result<RecognitionEvent, SttError> {
        Ok(RecognitionEvent::Final(Self::complete_text(
            self.recognizer.final_result(),
        )))
    }

    fn name(&self) -> &str {
        "vosk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Vosk モデルが必要
    fn loads_model_and_accepts_silence() {
        let models = std::path::PathBuf::from(
            std::env::var("VOSK_MODELS_DIR").unwrap_or_else(|_| "models".into()),
        );
        let path = crate::infra::stt::find_vosk_model(&models).expect("model directory");
        let mut rec = VoskRecognizer::new(&path, 16000).unwrap();
        rec.reset();
        for _ in 0..10 {
            let ev = rec.accept(&AudioFrame::new(vec![0; 1600], 16000)).unwrap();
            assert!(ev.is_empty());
        }
        assert!(rec.finalize().unwrap().is_final());
    }

    #[test]
    fn missing_model_is_engine_not_available() {
        let err = VoskRecognizer::new(Path::new("/nonexistent/vosk-model"), 16000)
            .err()
            .expect("should fail");
        assert_eq!(err.kind, crate::domain::speech::SttErrorKind::EngineNotAvailable);
    }
}
