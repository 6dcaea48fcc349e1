use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::domain::speech::AudioFrame;

/// ターン中に流れたフレームを溜めて WAV (16-bit mono) に書き出す。
pub struct TurnRecorder {
    output_dir: PathBuf,
    sample_rate: u32,
    samples: Vec<i16>,
}

impl TurnRecorder {
    pub fn new(output_dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            sample_rate,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(frame.samples());
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// `<output_dir>/<turn_id>.wav` に書き出してバッファを空にする。空なら何もしない。
    pub fn flush(&mut self, turn_id: Uuid) -> Result<Option<PathBuf>, String> {
        if self.samples.is_empty() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| format!("Failed to create audio dir: {}", e))?;
        let path = self.output_dir.join(format!("{turn_id}.wav"));
        write_wav(&path, self.sample_rate, &self.samples)?;
        self.samples.clear();
        Ok(Some(path))
    }
}

pub fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file =
        std::fs::File::create(path).map_err(|e| format!("Failed to create WAV file: {}", e))?;
    let buf_writer = std::io::BufWriter::with_capacity(64 * 1024, file);
    let mut writer = hound::WavWriter::new(buf_writer, spec)
        .map_err(|e| format!("Failed to create WAV writer: {}", e))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV: {}", e))
}
