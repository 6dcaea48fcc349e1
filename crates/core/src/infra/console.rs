use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::speech::Listener;

/// 標準入力からの回答（マイクなしでの動作確認用）。
///
/// 読み取りスレッドは1本だけ起動し、行をチャネルに流し続ける。
pub struct ConsoleListener {
    lines: mpsc::Receiver<String>,
    cancel: Arc<AtomicBool>,
    tick: Duration,
}

impl ConsoleListener {
    /// 標準入力を読むスレッドを起動する
    pub fn stdin() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::warn!("stdin read error: {e}");
                            break;
                        }
                    }
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| log::error!("Failed to spawn stdin reader: {e}"));
        Self::from_receiver(rx)
    }

    /// 任意の行ソースから作る
    pub fn from_receiver(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines,
            cancel: Arc::new(AtomicBool::new(false)),
            tick: Duration::from_millis(100),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Listener for ConsoleListener {
    fn listen(&mut self, timeout: Duration) -> String {
        print!("You: ");
        let _ = std::io::Write::flush(&mut std::io::stdout());
        // 表現できないほど長いタイムアウトは期限なしとして扱う
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return String::new();
            }
            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        log::info!("No typed answer within {}s", timeout.as_secs());
                        return String::new();
                    }
                    remaining.min(self.tick)
                }
                None => self.tick,
            };
            match self.lines.recv_timeout(wait) {
                Ok(line) => return line.trim().to_string(),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return String::new(),
            }
        }
    }
}
