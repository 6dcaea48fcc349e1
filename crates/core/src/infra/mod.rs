pub mod analyzer;
pub mod audio;
pub mod clock;
pub mod console;
pub mod metrics;
pub mod report;
pub mod speaker;
pub mod storage;
pub mod stt;
