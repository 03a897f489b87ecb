use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, execute};
use owo_colors::OwoColorize;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

/// terminal output of the cli: status lines plus one spinner line while waiting.
#[derive(Debug)]
pub struct CliLogger {
    pub level: LogLevel,
    frame: AtomicUsize,
    spinning: AtomicBool,
}

impl CliLogger {
    /// unknown levels fall back to `info`.
    pub fn new(level: &str) -> Self {
        Self {
            level: LogLevel::parse(level).unwrap_or(LogLevel::Info),
            frame: AtomicUsize::new(0),
            spinning: AtomicBool::new(false),
        }
    }

    fn line(&self, level: LogLevel, icon: impl Display, message: impl AsRef<str>) {
        if level > self.level {
            return;
        }
        self.clear_spinner();
        println!("{icon} {}", message.as_ref());
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.line(LogLevel::Info, "✓".green(), message);
    }

    pub fn failed(&self, message: impl AsRef<str>) {
        self.line(LogLevel::Error, "✗".red(), message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.line(LogLevel::Warn, "!".yellow(), message);
    }

    pub fn debug(&self, target: &str, message: impl AsRef<str>) {
        self.line(
            LogLevel::Debug,
            "λ".cyan(),
            format!("{:>15} {}", target.bold().bright_purple(), message.as_ref()),
        );
    }

    /// awaits `future`, animating a spinner next to `message` meanwhile.
    pub async fn while_loading<F, T>(&self, message: impl Into<String>, future: F) -> T
    where
        F: Future<Output = T>,
    {
        if self.level < LogLevel::Info {
            return future.await;
        }

        let message = message.into();
        let mut future = std::pin::pin!(future);
        let mut ticker = tokio::time::interval(Duration::from_millis(100));

        let output = loop {
            tokio::select! {
                output = &mut future => break output,
                _ = ticker.tick() => self.spin(&message),
            }
        };
        self.clear_spinner();
        output
    }

    fn spin(&self, message: &str) {
        let step = self.frame.fetch_add(1, Ordering::Relaxed);
        let frame = SPINNER[step % SPINNER.len()];
        self.spinning.store(true, Ordering::Relaxed);

        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = write!(stdout, "{} {message}", frame.yellow());
        let _ = stdout.flush();
    }

    fn clear_spinner(&self) {
        if !self.spinning.swap(false, Ordering::Relaxed) {
            return;
        }
        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = stdout.flush();
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

/// routes library events to the logger: warnings always, the rest as debug lines.
struct LibraryEvents {
    logger: Arc<CliLogger>,
}

impl<S: Subscriber> Layer<S> for LibraryEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !is_library_target(metadata.target()) {
            return;
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut line = collector.message.unwrap_or_default();
        for field in collector.fields {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&field);
        }

        if *metadata.level() <= Level::WARN {
            self.logger.warn(line);
        } else {
            self.logger.debug(metadata.target(), line);
        }
    }
}

/// events from the library crates; the cli reports its own progress directly.
fn is_library_target(target: &str) -> bool {
    ["kuronime", "kuronime_core"]
        .iter()
        .any(|krate| target == *krate || target.starts_with(&format!("{krate}::")))
}

pub fn init_tracing(logger: Arc<CliLogger>) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = Registry::default().with(LibraryEvents {
            logger: Arc::clone(&logger),
        });

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            logger.debug("logger", format!("tracing already initialised: {err}"));
        }
    });
}
