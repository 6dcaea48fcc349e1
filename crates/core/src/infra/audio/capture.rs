use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use serde::Serialize;

use super::resample::FrameResampler;
use crate::domain::speech::{AudioFrame, CaptureConfig};

/// 音声キャプチャエラー
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No audio input device found")]
    NoDevice,
    #[error("Audio input device not found: {0}")]
    DeviceNotFound(String),
    #[error("Audio device config error: {0}")]
    Config(String),
    #[error("Audio stream error: {0}")]
    Stream(String),
}

// ─── Device seam ─────────────────────────────────────────────────

/// 入力デバイス。エージェントの生存期間中保持し、ストリームはターンごとに開く。
pub trait AudioDevice: Send + Sync {
    fn name(&self) -> String;

    /// キャプチャスレッド上で呼ばれる。返したストリームの drop でデバイスを解放する。
    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn FrameStream>, CaptureError>;
}

/// 開いたストリーム。`read_frame` は短時間で戻る（タイムアウトなら `Ok(None)`）。
pub trait FrameStream {
    fn read_frame(&mut self) -> Result<Option<AudioFrame>, CaptureError>;
}

// ─── AudioSource ─────────────────────────────────────────────────

/// キャプチャスレッド終了時に必ず完了通知を送るガード
struct DoneSignal(mpsc::Sender<()>);

impl Drop for DoneSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// 1ターン分のキャプチャ。専用スレッドがフレームを無制限キューに積む。
pub struct AudioSource {
    stop_flag: Arc<AtomicBool>,
    frames: mpsc::Receiver<AudioFrame>,
    done_rx: mpsc::Receiver<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioSource {
    /// キャプチャスレッドを起動する。デバイスを開けなくてもエラーにはせず、キューが閉じるだけ。
    pub fn start(device: Arc<dyn AudioDevice>, config: CaptureConfig) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (frame_tx, frames) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let flag = stop_flag.clone();
        let spawned = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let _done = DoneSignal(done_tx);
                capture_loop(device.as_ref(), &config, &flag, &frame_tx);
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn capture thread: {}", e);
                None
            }
        };

        Self {
            stop_flag,
            frames,
            done_rx,
            thread,
        }
    }

    pub fn frames(&self) -> &mpsc::Receiver<AudioFrame> {
        &self.frames
    }

    /// 停止を要求する（待たない）
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// 停止を要求し、最大 `timeout` だけスレッド終了を待つ。終了を確認できたら true。
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.request_stop();
        let Some(handle) = self.thread.take() else {
            return true;
        };
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Capture thread did not stop within {}ms; detaching",
                    timeout.as_millis()
                );
                false
            }
        }
    }
}

impl Drop for AudioSource {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn capture_loop(
    device: &dyn AudioDevice,
    config: &CaptureConfig,
    stop_flag: &AtomicBool,
    frame_tx: &mpsc::Sender<AudioFrame>,
) {
    let mut stream = match device.open(config) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("Failed to open audio device {}: {}", device.name(), e);
            return;
        }
    };
    log::debug!("Capture started on {}", device.name());

    while !stop_flag.load(Ordering::Relaxed) {
        match stream.read_frame() {
            Ok(Some(frame)) => {
                if frame_tx.send(frame).is_err() {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                log::warn!("Audio read error, ending capture: {}", e);
                break;
            }
        }
    }
    log::debug!("Capture stopped on {}", device.name());
}

// ─── cpal ────────────────────────────────────────────────────────

/// 入力デバイス情報（`devices` コマンド用）
#[derive(Debug, Clone, Serialize)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub is_default: bool,
}

/// cpal のマイク入力。デバイス本体はストリームを開くスレッドで毎回引く。
pub struct CpalDevice {
    device_name: Option<String>,
    read_timeout: Duration,
}

impl CpalDevice {
    /// デバイスの存在を事前チェックする（stream は作らない）
    pub fn new(device_name: Option<String>) -> Result<Self, CaptureError> {
        find_device(device_name.as_deref())?;
        Ok(Self {
            device_name,
            read_timeout: Duration::from_millis(100),
        })
    }

    pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::Config(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
                let config = device.default_input_config().ok();
                InputDeviceInfo {
                    index,
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                    channels: config.as_ref().map(|c| c.channels()),
                    name,
                }
            })
            .collect())
    }
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| CaptureError::Config(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string())),
    }
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| "default input".to_string())
    }

    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn FrameStream>, CaptureError> {
        let device = find_device(self.device_name.as_deref())?;
        let supported_config = device
            .default_input_config()
            .map_err(|e| CaptureError::Config(e.to_string()))?;

        let device_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();
        let sample_format = supported_config.sample_format();

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sample_tx, sample_rx) = mpsc::channel::<Vec<f32>>();
        let stream_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let err_slot = stream_error.clone();
        let on_error = move |err: cpal::StreamError| {
            log::error!("Audio stream error: {}", err);
            *err_slot.lock() = Some(err.to_string());
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let _ = sample_tx.send(to_mono(data, channels));
                },
                on_error,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                    let f32_data: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    let _ = sample_tx.send(to_mono(&f32_data, channels));
                },
                on_error,
                None,
            ),
            format => {
                return Err(CaptureError::Config(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        }
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        log::info!(
            "Audio capture opened: {}Hz, {} channels, {:?} -> {}Hz mono",
            device_rate,
            channels,
            sample_format,
            config.sample_rate
        );

        Ok(Box::new(CpalFrameStream {
            _stream: stream,
            samples: sample_rx,
            stream_error,
            resampler: FrameResampler::new(device_rate, config.sample_rate, config.frame_size),
            pending: VecDeque::new(),
            sample_rate: config.sample_rate,
            read_timeout: self.read_timeout,
        }))
    }
}

/// cpal::Stream を保持する。drop でストリームが止まる。
struct CpalFrameStream {
    _stream: cpal::Stream,
    samples: mpsc::Receiver<Vec<f32>>,
    stream_error: Arc<Mutex<Option<String>>>,
    resampler: FrameResampler,
    pending: VecDeque<AudioFrame>,
    sample_rate: u32,
    read_timeout: Duration,
}

impl FrameStream for CpalFrameStream {
    fn read_frame(&mut self) -> Result<Option<AudioFrame>, CaptureError> {
        if let Some(err) = self.stream_error.lock().take() {
            return Err(CaptureError::Stream(err));
        }
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }

        match self.samples.recv_timeout(self.read_timeout) {
            Ok(chunk) => {
                let rate = self.sample_rate;
                let pending = &mut self.pending;
                self.resampler.push(&chunk, |frame| {
                    pending.push_back(AudioFrame::from_f32(frame, rate));
                });
                Ok(self.pending.pop_front())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(CaptureError::Stream("input stream closed".into()))
            }
        }
    }
}

/// ステレオ → モノ変換（チャンネル平均）
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// 指定数のフレームを返したあとタイムアウトし続けるデバイス
    struct FakeDevice {
        frames: usize,
        fail_open: bool,
        fail_after: Option<usize>,
        opened: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl FakeDevice {
        fn new(frames: usize) -> Self {
            Self {
                frames,
                fail_open: false,
                fail_after: None,
                opened: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FakeStream {
        remaining: usize,
        fail_after: Option<usize>,
        produced: usize,
        released: Arc<AtomicUsize>,
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FrameStream for FakeStream {
        fn read_frame(&mut self) -> Result<Option<AudioFrame>, CaptureError> {
            if self.fail_after == Some(self.produced) {
                return Err(CaptureError::Stream("unplugged".into()));
            }
            if self.remaining == 0 {
                thread::sleep(Duration::from_millis(5));
                return Ok(None);
            }
            self.remaining -= 1;
            self.produced += 1;
            Ok(Some(AudioFrame::new(vec![0; 160], 16000)))
        }
    }

    impl AudioDevice for FakeDevice {
        fn name(&self) -> String {
            "fake".into()
        }

        fn open(&self, _config: &CaptureConfig) -> Result<Box<dyn FrameStream>, CaptureError> {
            if self.fail_open {
                return Err(CaptureError::NoDevice);
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStream {
                remaining: self.frames,
                fail_after: self.fail_after,
                produced: 0,
                released: self.released.clone(),
            }))
        }
    }

    fn drain(source: &AudioSource, want: usize) -> usize {
        let mut got = 0;
        while got < want {
            match source.frames().recv_timeout(Duration::from_secs(2)) {
                Ok(_) => got += 1,
                Err(_) => break,
            }
        }
        got
    }

    #[test]
    fn delivers_frames_in_order_and_releases_on_stop() {
        let device = FakeDevice::new(5);
        let released = device.released.clone();
        let mut source = AudioSource::start(Arc::new(device), CaptureConfig::default());
        assert_eq!(drain(&source, 5), 5);
        assert!(source.stop(Duration::from_secs(2)));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_failure_closes_queue() {
        let mut device = FakeDevice::new(0);
        device.fail_open = true;
        let mut source = AudioSource::start(Arc::new(device), CaptureConfig::default());
        assert!(matches!(
            source.frames().recv_timeout(Duration::from_secs(2)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
        assert!(source.stop(Duration::from_secs(2)));
    }

    #[test]
    fn read_error_ends_capture_and_releases_device() {
        let mut device = FakeDevice::new(10);
        device.fail_after = Some(3);
        let released = device.released.clone();
        let opened = device.opened.clone();
        let source = AudioSource::start(Arc::new(device), CaptureConfig::default());
        assert_eq!(drain(&source, 10), 3);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn to_mono_averages_channels() {
        assert_eq!(to_mono(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(to_mono(&[0.5, 0.1], 1), vec![0.5, 0.1]);
    }
}
