//! Where job log lines go

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

/// Line-oriented job log
pub trait LogSink: Send + Sync {
    fn write(&self, line: &str);
}

/// Forwards lines to a channel, typically a streaming response. Lines
/// written after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn write(&self, line: &str) {
        let _ = self.tx.send(line.to_string());
    }
}

/// Prints lines to stdout
#[derive(Debug, Default, Clone)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, line: &str) {
        println!("{}", line);
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for CollectingSink {
    fn write(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}
