use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

use vi_core::domain::error::AppError;
use vi_core::domain::interview::{FaqBook, InterviewDetail};
use vi_core::domain::settings::InterviewSettings;
use vi_core::domain::speech::Listener;
use vi_core::infra::analyzer::{create_analyzer, KeywordAnalyzer, TextAnalyzer};
use vi_core::infra::audio::{CpalDevice, SpeechListener, TurnRecorder, TurnSettings};
use vi_core::infra::console::ConsoleListener;
use vi_core::infra::metrics::Metrics;
use vi_core::infra::speaker::create_speaker;
use vi_core::infra::storage::Storage;
use vi_core::infra::stt::create_recognizer;
use vi_core::usecase::{refresh_dashboard, Interviewer};

use crate::cli::InterviewArgs;
use crate::events;

/// コマンドエラー型（終了コードと利用者向けメッセージに変換される）
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    App(#[from] AppError),
    #[error("Interview not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CommandError::App(e) if e.is_interrupted())
    }
}

type CmdResult<T> = Result<T, CommandError>;

fn open_storage(settings: &InterviewSettings) -> CmdResult<Storage> {
    settings.paths.ensure_dirs()?;
    Ok(Storage::open(&settings.paths.database())?)
}

// ─── interview ───────────────────────────────────────────────────

pub fn interview(
    settings: InterviewSettings,
    args: &InterviewArgs,
    cancel: Arc<AtomicBool>,
) -> CmdResult<()> {
    let storage = open_storage(&settings)?;
    let faqs = load_faqs(&settings.paths.faq_file())?;
    let metrics = Arc::new(Metrics::new());

    let (listener, printer) = if args.text {
        println!("Text mode: type each answer and press Enter.");
        let listener: Box<dyn Listener> =
            Box::new(ConsoleListener::stdin().with_cancel_flag(cancel.clone()));
        (listener, None)
    } else {
        let (listener, printer) = speech_listener(&settings, metrics.clone(), cancel.clone())?;
        (listener, Some(printer))
    };

    let analyzer: Box<dyn TextAnalyzer> =
        match create_analyzer(&settings.analyzer, &settings.script.organization) {
            Ok(analyzer) => analyzer,
            Err(e) => {
                log::warn!("{e}; using keyword analyzer");
                Box::new(KeywordAnalyzer::new(settings.script.organization.clone()))
            }
        };
    log::info!("Analyzer: {}", analyzer.name());

    let speaker = create_speaker(&settings.speech_output);
    let mut interviewer = Interviewer::new(settings, listener, speaker, analyzer, faqs, storage)?
        .with_metrics(metrics)
        .with_cancel_flag(cancel);

    let result = interviewer.conduct();
    // リスナーを落としてイベント送信側を閉じる
    drop(interviewer);
    if let Some(printer) = printer {
        let _ = printer.join();
    }

    let outcome = result?;
    println!();
    println!("Interview saved with ID {}", outcome.record.interview_id);
    println!("Transcript: {}", outcome.transcript.display());
    println!("Summary:    {}", outcome.summary.markdown.display());
    Ok(())
}

fn speech_listener(
    settings: &InterviewSettings,
    metrics: Arc<Metrics>,
    cancel: Arc<AtomicBool>,
) -> CmdResult<(Box<dyn Listener>, std::thread::JoinHandle<()>)> {
    let device = CpalDevice::new(settings.audio.input_device.clone())
        .map_err(|e| AppError::device(e.to_string()))?;
    let recognizer = create_recognizer(&settings.recognizer, settings.audio.sample_rate)
        .map_err(|e| AppError::recognizer(format!("{e} (use --text to type answers)")))?;
    log::info!("Recognizer: {}", recognizer.name());

    let (tx, rx) = mpsc::channel();
    let printer = events::spawn_printer(rx)?;

    let mut listener = SpeechListener::new(
        Arc::new(device),
        recognizer,
        settings.capture_config(),
        TurnSettings::from(&settings.listening),
    )
    .with_cancel_flag(cancel)
    .with_events(tx)
    .with_metrics(metrics);
    if settings.audio.keep_audio {
        listener = listener.with_recorder(TurnRecorder::new(
            settings.paths.audio_dir(),
            settings.audio.sample_rate,
        ));
    }
    Ok((Box::new(listener), printer))
}

/// FAQ ファイルがなければ空の FAQ で続ける
fn load_faqs(path: &Path) -> CmdResult<FaqBook> {
    if !path.exists() {
        log::warn!("FAQ file {} not found; every question will be noted for the team", path.display());
        return Ok(FaqBook::default());
    }
    let faqs = FaqBook::load(path)?;
    log::info!("Loaded {} FAQ entries", faqs.len());
    Ok(faqs)
}

// ─── maintenance ─────────────────────────────────────────────────

pub fn list(settings: &InterviewSettings, limit: u32) -> CmdResult<()> {
    let storage = open_storage(settings)?;
    let items = storage.list_interviews(limit)?;
    if items.is_empty() {
        println!("No interviews found.");
        return Ok(());
    }

    println!("{:<17} {:<20} {:<24} {}", "ID", "Started", "Name", "Interest");
    for item in items {
        println!(
            "{:<17} {:<20} {:<24} {}",
            item.interview_id,
            item.started_at,
            item.name.as_deref().unwrap_or("-"),
            item.interest_level.map(|l| l.as_str()).unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn view(settings: &InterviewSettings, id: &str) -> CmdResult<()> {
    let storage = open_storage(settings)?;
    let detail = storage
        .get_interview(id)?
        .ok_or_else(|| CommandError::NotFound(id.to_string()))?;
    print!("{}", render_detail(&detail));
    Ok(())
}

fn render_detail(detail: &InterviewDetail) -> String {
    let mut out = format!(
        "Interview {}\nStarted: {}\n\n",
        detail.interview_id, detail.started_at
    );
    if let Some(info) = &detail.extracted_info {
        out.push_str(&format!(
            "Name: {}\nInterest: {}\nReadiness: {}\nBackground: {}\n\n",
            info.name,
            info.interest_level.as_str(),
            info.readiness.as_str(),
            info.background
        ));
    }
    for qa in &detail.answers {
        out.push_str(&format!(
            "Q{}: {}\nA{}: {} (confidence {:.2})\n\n",
            qa.number, qa.question, qa.number, qa.answer, qa.confidence
        ));
    }
    for faq in &detail.faq_log {
        out.push_str(&format!("Candidate: {}\nAgent: {}\n\n", faq.question, faq.reply));
    }
    out.push_str(&format!("Summary:\n{}\n", detail.summary));
    out
}

pub fn export(settings: &InterviewSettings, file: Option<PathBuf>) -> CmdResult<()> {
    let storage = open_storage(settings)?;
    let all = storage.export_all()?;
    let path = file.unwrap_or_else(|| settings.paths.data_dir.join("interviews_export.json"));
    let body = serde_json::to_string_pretty(&all)
        .map_err(|e| AppError::internal(format!("Failed to serialize export: {e}")))?;
    std::fs::write(&path, body)?;
    println!("Exported {} interviews to {}", all.len(), path.display());
    Ok(())
}

pub fn clear(settings: &InterviewSettings, yes: bool) -> CmdResult<()> {
    if !yes {
        print!("This deletes every stored interview. Type 'yes' to continue: ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        if answer.trim() != "yes" {
            println!("Cancelled.");
            return Ok(());
        }
    }
    let storage = open_storage(settings)?;
    let removed = storage.clear_all()?;
    println!("Deleted {removed} interviews.");
    Ok(())
}

pub fn devices() -> CmdResult<()> {
    let devices = CpalDevice::list_input_devices().map_err(|e| AppError::device(e.to_string()))?;
    if devices.is_empty() {
        println!("No audio input devices found.");
    }
    for d in devices {
        let marker = if d.is_default { "*" } else { " " };
        let rate = d
            .sample_rate
            .map(|r| format!("{r} Hz"))
            .unwrap_or_else(|| "-".to_string());
        let channels = d
            .channels
            .map(|c| format!("{c} ch"))
            .unwrap_or_else(|| "-".to_string());
        println!("{marker} [{}] {} ({rate}, {channels})", d.index, d.name);
    }
    Ok(())
}

pub fn dashboard(settings: &InterviewSettings) -> CmdResult<()> {
    let storage = open_storage(settings)?;
    let path = refresh_dashboard(&storage, &settings.paths, &settings.script.organization)?;
    println!("Dashboard written to {}", path.display());
    Ok(())
}
