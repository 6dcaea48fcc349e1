mod cli;
mod commands;
mod events;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

pub use cli::Cli;
use cli::Command;
use commands::CommandError;

/// Ctrl-C で中断されたときの終了コード
const EXIT_INTERRUPTED: u8 = 130;

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(cli.verbose, None);
            log::error!("{e}");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.verbose, Some(&settings.paths.session_log()));

    let result = match &cli.command {
        None => {
            let cancel = install_ctrl_c();
            commands::interview(settings, &Default::default(), cancel)
        }
        Some(Command::Interview(args)) => {
            let cancel = install_ctrl_c();
            commands::interview(settings, args, cancel)
        }
        Some(Command::List { limit }) => commands::list(&settings, *limit),
        Some(Command::View { id }) => commands::view(&settings, id),
        Some(Command::Export { file }) => commands::export(&settings, file.clone()),
        Some(Command::Clear { yes }) => commands::clear(&settings, *yes),
        Some(Command::Devices) => commands::devices(),
        Some(Command::Dashboard) => commands::dashboard(&settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_interrupted() => {
            eprintln!("\nInterview interrupted.");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => report(e),
    }
}

fn report(e: CommandError) -> ExitCode {
    log::error!("{e}");
    eprintln!("Error: {e}");
    ExitCode::FAILURE
}

// ─── Logging ─────────────────────────────────────────────────────

/// 標準エラーとセッションログファイルの両方に書く
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        if let Some(file) = &mut self.file {
            // ファイル側の失敗で標準エラーへの出力を止めない
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        if let Some(file) = &mut self.file {
            let _ = file.flush();
        }
        Ok(())
    }
}

fn open_session_log(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

fn init_logging(verbose: bool, session_log: Option<&Path>) {
    let level = if verbose { "debug" } else { "info" };
    let file = session_log.and_then(open_session_log);
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(Box::new(Tee { file })))
        .try_init();
}

// ─── Ctrl-C ──────────────────────────────────────────────────────

/// 1回目で中断フラグを立て、2回目で即終了する監視スレッドを起動する
fn install_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();

    let spawned = std::thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start signal runtime: {e}");
                    return;
                }
            };
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for Ctrl-C: {e}");
                        return;
                    }
                    if flag.swap(true, Ordering::SeqCst) {
                        eprintln!("\nForced exit.");
                        std::process::exit(i32::from(EXIT_INTERRUPTED));
                    }
                    log::warn!("Ctrl-C received; stopping after the current turn (press again to force)");
                }
            });
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn Ctrl-C watcher: {e}");
    }
    cancel
}
