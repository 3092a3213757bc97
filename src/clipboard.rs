//! Clipboard sinks for copying reports

use crate::errors::{DrWebError, Result};
use std::io::Write;
use std::sync::Mutex;

/// Destination for copied report text
pub trait ClipboardSink: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// The desktop clipboard.
///
/// One handle is held for the life of the sink: on X11 and Wayland the
/// copied text is served by this process and disappears with the last handle.
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    /// Fails when no clipboard is reachable from this session
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(arboard::Clipboard::new()?),
        })
    }

    /// Current text contents, as seen through the held handle
    pub fn read_text(&self) -> Result<String> {
        Ok(self.lock()?.get_text()?)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, arboard::Clipboard>> {
        self.inner
            .lock()
            .map_err(|_| DrWebError::Clipboard("clipboard handle poisoned".to_string()))
    }
}

impl ClipboardSink for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        self.lock()?.set_text(text)?;
        Ok(())
    }
}

/// Prints copied text to stdout, for hosts without a clipboard
#[derive(Debug, Default)]
pub struct StdoutClipboard;

impl ClipboardSink for StdoutClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", text)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Keeps every write in memory
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    writes: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(text.to_string());
        }
        Ok(())
    }
}

/// Prefer the desktop clipboard, falling back to stdout
pub fn default_sink() -> Box<dyn ClipboardSink> {
    match SystemClipboard::new() {
        Ok(clipboard) => Box::new(clipboard),
        Err(e) => {
            tracing::debug!("System clipboard unavailable ({}), copying to stdout", e);
            Box::new(StdoutClipboard)
        }
    }
}
