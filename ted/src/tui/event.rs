//! Terminal input forwarded over a channel.

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
}

/// Reads crossterm events on a blocking thread until cancelled or the
/// receiver goes away.
pub struct EventHandler {
    rx: mpsc::Receiver<Event>,
    stop: CancellationToken,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        let stop = CancellationToken::new();
        let token = stop.clone();
        tokio::task::spawn_blocking(move || {
            while !token.is_cancelled() {
                match event::poll(POLL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "terminal poll failed");
                        break;
                    }
                }
                let event = match event::read() {
                    Ok(CrosstermEvent::Key(key)) if key.kind != KeyEventKind::Release => Event::Key(key),
                    Ok(CrosstermEvent::Mouse(mouse)) => Event::Mouse(mouse),
                    Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "terminal read failed");
                        break;
                    }
                };
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });
        Self { rx, stop }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
