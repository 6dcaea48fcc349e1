pub mod capture;
pub mod pipeline;
pub mod recorder;
pub mod resample;

pub use capture::{
    AudioDevice, AudioSource, CaptureError, CpalDevice, FrameStream, InputDeviceInfo,
};
pub use pipeline::{SpeechListener, Turn, TurnEvent, TurnOutcome, TurnSettings};
pub use recorder::TurnRecorder;
pub use resample::FrameResampler;
