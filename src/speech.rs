//! Speech Output Sink boundary
//!
//! Alerts are short strings handed off fire-and-forget. Vocalizing them is
//! the sink's business.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

pub trait SpeechSink: Send + Sync {
    fn speak(&self, text: &str);
}

/// Writes alerts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSpeechSink;

impl SpeechSink for TracingSpeechSink {
    fn speak(&self, text: &str) {
        tracing::info!(target: "tacnet::speech", alert = text, "Speaking");
    }
}

/// Queues alerts for a synthesizer thread
#[derive(Debug, Clone)]
pub struct ChannelSpeechSink {
    tx: Sender<String>,
}

impl ChannelSpeechSink {
    pub fn new(capacity: usize) -> (Self, Receiver<String>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl SpeechSink for ChannelSpeechSink {
    fn speak(&self, text: &str) {
        match self.tx.try_send(text.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(alert = text, "Speech queue full, alert dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(alert = text, "Speech consumer gone");
            }
        }
    }
}
