//! Typing indicator shown while a request is in flight.

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
    ExecutableCommand,
};
use std::io::{stdout, Write};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Spinner animation frames.
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Plain ASCII frames for terminals without braille glyphs.
pub const LINE: &[&str] = &["-", "\\", "|", "/"];

/// Spinner configuration.
#[derive(Clone)]
pub struct SpinnerConfig {
    /// Animation frames.
    pub frames: Vec<&'static str>,
    /// Frame duration in milliseconds.
    pub interval_ms: u64,
    /// Spinner color.
    pub color: Color,
    /// Append elapsed seconds after this many seconds have passed.
    pub show_elapsed_after: Option<u64>,
}

impl Default for SpinnerConfig {
    fn default() -> Self {
        Self {
            frames: SPINNER_FRAMES.to_vec(),
            interval_ms: 80,
            color: Color::Cyan,
            show_elapsed_after: Some(3),
        }
    }
}

impl SpinnerConfig {
    /// Braille frames when the locale is UTF-8, ASCII frames otherwise.
    ///
    /// The first non-empty of `LC_ALL`, `LC_CTYPE` and `LANG` decides.
    pub fn for_locale(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        let utf8 = locale.is_some_and(|l| {
            let l = l.to_lowercase();
            l.contains("utf-8") || l.contains("utf8")
        });

        if utf8 {
            Self::default()
        } else {
            Self {
                frames: LINE.to_vec(),
                ..Self::default()
            }
        }
    }

    fn status_line(&self, frame_idx: usize, message: &str, elapsed: Duration) -> String {
        let frame = self.frames[frame_idx % self.frames.len()];
        match self.show_elapsed_after {
            Some(after) if elapsed.as_secs() >= after => {
                format!("{} {} ({}s)", frame, message, elapsed.as_secs())
            }
            _ => format!("{} {}", frame, message),
        }
    }
}

/// A running spinner. Stops when [`SpinnerHandle::stop`] is awaited or the
/// handle is dropped.
pub struct SpinnerHandle {
    stop_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SpinnerHandle {
    /// Stop the spinner and clear its line.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        clear_line();
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        if self.task.is_some() {
            clear_line();
        }
    }
}

fn clear_line() {
    let mut stdout = stdout();
    let _ = stdout.execute(MoveToColumn(0));
    let _ = stdout.execute(Clear(ClearType::CurrentLine));
    let _ = stdout.execute(Show);
    let _ = stdout.flush();
}

/// Spinner for showing activity.
pub struct Spinner {
    config: SpinnerConfig,
}

impl Spinner {
    pub fn new() -> Self {
        Self {
            config: SpinnerConfig::default(),
        }
    }

    pub fn with_config(config: SpinnerConfig) -> Self {
        Self { config }
    }

    /// Start the spinner with a message. Must be called inside a runtime.
    pub fn start(&self, message: impl Into<String>) -> SpinnerHandle {
        let config = self.config.clone();
        let message = message.into();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut frame_idx = 0;
            let mut stdout = stdout();
            let _ = stdout.execute(Hide);

            loop {
                if *stop_rx.borrow() {
                    break;
                }

                let line = config.status_line(frame_idx, &message, started.elapsed());
                let _ = stdout.execute(MoveToColumn(0));
                let _ = stdout.execute(Clear(ClearType::CurrentLine));
                let _ = stdout.execute(SetForegroundColor(config.color));
                let _ = stdout.execute(Print(line));
                let _ = stdout.execute(ResetColor);
                let _ = stdout.flush();

                frame_idx += 1;

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(config.interval_ms)) => {}
                    _ = stop_rx.changed() => { break; }
                }
            }

            let _ = stdout.execute(Show);
        });

        SpinnerHandle {
            stop_tx,
            task: Some(task),
        }
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}
