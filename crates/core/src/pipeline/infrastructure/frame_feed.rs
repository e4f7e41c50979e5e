use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::conversion::sensor_frame::SensorFrame;

/// Keep-latest frame mailbox between the camera subsystem and the
/// analyzer worker.
///
/// Capacity is one: when the analyzer falls behind, the undelivered
/// frame is discarded in favour of the newest capture. Frame loss is
/// deliberately preferred over latency growth, and memory is bounded
/// to a single in-flight frame.
#[derive(Clone)]
pub struct FrameFeed {
    tx: Sender<SensorFrame>,
    rx: Receiver<SensorFrame>,
}

impl FrameFeed {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Delivers a frame, displacing any undelivered predecessor.
    pub fn push(&self, frame: SensorFrame) {
        let mut frame = frame;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    let _ = self.rx.try_recv();
                    frame = returned;
                }
                // Analyzer gone: fire-and-forget, the frame is dropped.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Consumer end for the analyzer worker.
    pub fn receiver(&self) -> Receiver<SensorFrame> {
        self.rx.clone()
    }
}

impl Default for FrameFeed {
    fn default() -> Self {
        Self::new()
    }
}
