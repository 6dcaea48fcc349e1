use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use vi_core::domain::error::AppError;
use vi_core::domain::settings::{AnalyzerChoice, DataPaths, InterviewSettings, RecognizerChoice};

#[derive(Parser, Debug)]
#[command(name = "voice-interview", version, about = "Offline voice interview agent")]
pub struct Cli {
    /// JSON settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for transcripts, summaries, database and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Conduct an interview (default)
    Interview(InterviewArgs),
    /// List recent interviews
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one interview in detail
    View { id: String },
    /// Export all interviews as JSON
    Export { file: Option<PathBuf> },
    /// Delete all stored interviews
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// List audio input devices
    Devices,
    /// Regenerate the statistics dashboard
    Dashboard,
}

#[derive(Args, Debug, Default, Clone)]
pub struct InterviewArgs {
    /// Type answers instead of speaking them
    #[arg(long)]
    pub text: bool,

    /// Vosk model directory
    #[arg(long)]
    pub model: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub analyzer: Option<AnalyzerArg>,

    /// Input device name
    #[arg(long)]
    pub device: Option<String>,

    /// Keep each turn's audio as WAV under <data-dir>/audio
    #[arg(long)]
    pub keep_audio: bool,

    #[arg(long)]
    pub organization: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerArg {
    Keyword,
    Claude,
}

impl From<AnalyzerArg> for AnalyzerChoice {
    fn from(arg: AnalyzerArg) -> Self {
        match arg {
            AnalyzerArg::Keyword => AnalyzerChoice::Keyword,
            AnalyzerArg::Claude => AnalyzerChoice::Claude,
        }
    }
}

impl Cli {
    /// 設定ファイルを読み、CLI フラグで上書きする
    pub fn settings(&self) -> Result<InterviewSettings, AppError> {
        let mut settings = match &self.config {
            Some(path) => InterviewSettings::load(path)?,
            None => InterviewSettings::default(),
        };
        if let Some(dir) = &self.data_dir {
            settings.paths = DataPaths::new(dir);
        }
        if let Some(Command::Interview(args)) = &self.command {
            args.apply(&mut settings);
        }
        settings.validate()?;
        Ok(settings)
    }
}

impl InterviewArgs {
    pub fn apply(&self, settings: &mut InterviewSettings) {
        if let Some(model) = &self.model {
            settings.recognizer.engine = RecognizerChoice::Vosk;
            settings.recognizer.model_path = Some(model.clone());
        }
        if let Some(analyzer) = self.analyzer {
            settings.analyzer.backend = analyzer.into();
        }
        if let Some(device) = &self.device {
            settings.audio.input_device = Some(device.clone());
        }
        if self.keep_audio {
            settings.audio.keep_audio = true;
        }
        if let Some(org) = &self.organization {
            settings.script.organization = org.clone();
        }
    }
}
