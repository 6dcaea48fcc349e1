use std::process::Command;

use crate::domain::error::AppError;
use crate::domain::settings::{SpeakerChoice, SpeakerSettings};

/// エージェントの発話先 trait
pub trait Speaker: Send {
    fn speak(&mut self, text: &str) -> Result<(), AppError>;
    fn name(&self) -> &str;
}

/// 標準出力に表示するだけの発話
pub struct ConsoleSpeaker;

impl Speaker for ConsoleSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), AppError> {
        println!("Agent: {text}");
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// 外部 TTS コマンド（say / espeak）で読み上げる。読み上げ終わるまでブロックする。
pub struct CommandSpeaker {
    program: String,
    rate: u32,
}

impl CommandSpeaker {
    pub fn new(program: Option<String>, rate: u32) -> Self {
        Self {
            program: program.unwrap_or_else(|| default_program().to_string()),
            rate,
        }
    }

    /// `say -r <rate>` / `espeak -s <rate>` 形式の引数
    fn args(&self, text: &str) -> Vec<String> {
        let rate_flag = if self.program.ends_with("say") { "-r" } else { "-s" };
        vec![rate_flag.to_string(), self.rate.to_string(), text.to_string()]
    }
}

fn default_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), AppError> {
        println!("Agent: {text}");
        let status = Command::new(&self.program)
            .args(self.args(text))
            .status()
            .map_err(|e| AppError::device(format!("Failed to run {}: {e}", self.program)))?;
        if !status.success() {
            return Err(AppError::device(format!(
                "{} exited with {status}",
                self.program
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "command"
    }
}

pub fn create_speaker(settings: &SpeakerSettings) -> Box<dyn Speaker> {
    match settings.backend {
        SpeakerChoice::Console => Box::new(ConsoleSpeaker),
        SpeakerChoice::Command => Box::new(CommandSpeaker::new(settings.command.clone(), settings.rate)),
    }
}
