#[cfg(feature = "high-quality-resample")]
use rubato::{FftFixedIn, Resampler};

/// rubato に渡す入力チャンク長
#[cfg(feature = "high-quality-resample")]
const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// デバイスのレートから認識器のレートへ変換し、固定長フレームに切り分ける。
pub struct FrameResampler {
    backend: Backend,
    frame_samples: usize,
    pending: Vec<f32>,
}

enum Backend {
    Passthrough,
    #[cfg(feature = "high-quality-resample")]
    Fft {
        resampler: FftFixedIn<f32>,
        chunk_in: usize,
        in_buf: Vec<f32>,
    },
    Linear(LinearResampler),
}

impl FrameResampler {
    pub fn new(in_hz: u32, out_hz: u32, frame_samples: usize) -> Self {
        let frame_samples = frame_samples.max(1);
        let backend = if in_hz == out_hz || in_hz == 0 || out_hz == 0 {
            Backend::Passthrough
        } else {
            Self::resampling_backend(in_hz, out_hz)
        };
        Self {
            backend,
            frame_samples,
            pending: Vec::with_capacity(frame_samples),
        }
    }

    #[cfg(feature = "high-quality-resample")]
    fn resampling_backend(in_hz: u32, out_hz: u32) -> Backend {
        match FftFixedIn::<f32>::new(in_hz as usize, out_hz as usize, RESAMPLER_CHUNK_SIZE, 1, 1) {
            Ok(resampler) => Backend::Fft {
                resampler,
                chunk_in: RESAMPLER_CHUNK_SIZE,
                in_buf: Vec::with_capacity(RESAMPLER_CHUNK_SIZE),
            },
            Err(e) => {
                log::warn!("FFT resampler unavailable ({e}); using linear interpolation");
                Backend::Linear(LinearResampler::new(in_hz, out_hz))
            }
        }
    }

    #[cfg(not(feature = "high-quality-resample"))]
    fn resampling_backend(in_hz: u32, out_hz: u32) -> Backend {
        Backend::Linear(LinearResampler::new(in_hz, out_hz))
    }

    /// サンプルを投入し、揃ったフレームごとに `emit` を呼ぶ
    pub fn push(&mut self, src: &[f32], mut emit: impl FnMut(&[f32])) {
        let mut converted = Vec::new();
        match &mut self.backend {
            Backend::Passthrough => converted.extend_from_slice(src),
            #[cfg(feature = "high-quality-resample")]
            Backend::Fft {
                resampler,
                chunk_in,
                in_buf,
            } => {
                let mut src = src;
                while !src.is_empty() {
                    let take = (*chunk_in - in_buf.len()).min(src.len());
                    in_buf.extend_from_slice(&src[..take]);
                    src = &src[take..];

                    if in_buf.len() == *chunk_in {
                        match resampler.process(&[&in_buf[..]], None) {
                            Ok(out) => converted.extend_from_slice(&out[0]),
                            Err(e) => log::warn!("Resampling failed, dropping chunk: {e}"),
                        }
                        in_buf.clear();
                    }
                }
            }
            Backend::Linear(linear) => linear.process(src, &mut converted),
        }
        self.emit_frames(&converted, &mut emit);
    }

    fn emit_frames(&mut self, mut data: &[f32], emit: &mut impl FnMut(&[f32])) {
        while !data.is_empty() {
            let take = (self.frame_samples - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == self.frame_samples {
                emit(&self.pending);
                self.pending.clear();
            }
        }
    }
}

/// チャンクをまたいで位相を保つ線形補間
struct LinearResampler {
    step: f64,
    position: f64,
    carry: Option<f32>,
}

impl LinearResampler {
    fn new(in_hz: u32, out_hz: u32) -> Self {
        Self {
            step: in_hz as f64 / out_hz as f64,
            position: 0.0,
            carry: None,
        }
    }

    fn process(&mut self, src: &[f32], out: &mut Vec<f32>) {
        if src.is_empty() {
            return;
        }
        let mut buf = Vec::with_capacity(src.len() + 1);
        buf.extend(self.carry);
        buf.extend_from_slice(src);

        let last = (buf.len() - 1) as f64;
        while self.position < last {
            let i = self.position.floor() as usize;
            let frac = (self.position - i as f64) as f32;
            out.push(buf[i] * (1.0 - frac) + buf[i + 1] * frac);
            self.position += self.step;
        }
        self.position -= last;
        self.carry = buf.last().copied();
    }
}
