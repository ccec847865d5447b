use std::sync::mpsc;

use crate::ScanEvent;

/// Receives advisory events from workers and the registry.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ScanEvent);
}

/// Forwards events over a std channel; drops them once the receiver is gone.
pub struct ChannelEventSink {
    tx: mpsc::Sender<ScanEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<ScanEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: ScanEvent) {}
}
