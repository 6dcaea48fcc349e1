use crate::domain::speech::{AudioFrame, RecognitionEvent, SttError, StreamingRecognizer};

/// 何も認識しない認識器。モデルなしでフローを確認する用途。
pub struct NoopRecognizer;

impl StreamingRecognizer for NoopRecognizer {
    fn reset(&mut self) {}

    fn accept(&mut self, _frame: &AudioFrame) -> Result<RecognitionEvent, SttError> {
        Ok(RecognitionEvent::Partial(String::new()))
    }

    fn finalize(&mut self) -> Result<RecognitionEvent, SttError> {
        Ok(RecognitionEvent::Final(String::new()))
    }

    fn name(&self) -> &str {
        "noop"
    }
}
