use std::io::Write;
use std::sync::mpsc;
use std::thread::JoinHandle;

use vi_core::infra::audio::TurnEvent;

/// ターンイベントを端末に表示するスレッドを起動する。送信側がすべて drop されると終了する。
pub fn spawn_printer(events: mpsc::Receiver<TurnEvent>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("turn-events".into())
        .spawn(move || {
            for event in events {
                if let Some(line) = render(&event) {
                    let mut out = std::io::stdout().lock();
                    let _ = out.write_all(line.as_bytes());
                    let _ = out.flush();
                }
            }
        })
}

/// 1イベント分の表示文字列。表示しないイベントは None。
fn render(event: &TurnEvent) -> Option<String> {
    match event {
        TurnEvent::Listening { timeout, .. } => {
            Some(format!("[listening, up to {}s]\n", timeout.as_secs()))
        }
        TurnEvent::Partial(text) if !text.is_empty() => Some(format!("  ... {text}\n")),
        TurnEvent::Partial(_) => None,
        TurnEvent::Heard(text) => Some(format!("  heard: {text}\n")),
        TurnEvent::StillWaiting { elapsed } => {
            Some(format!("  (still listening, {}s)\n", elapsed.as_secs()))
        }
        TurnEvent::Finalizing(reason) => {
            log::debug!("Turn finalizing: {:?}", reason);
            None
        }
        TurnEvent::Completed { text, .. } if text.is_empty() => {
            Some("You: (no response)\n".to_string())
        }
        TurnEvent::Completed { text, .. } => Some(format!("You: {text}\n")),
        TurnEvent::Error(message) => {
            log::warn!("Recognition error: {message}");
            None
        }
    }
}
