use thiserror::Error;

use crate::pipeline::infrastructure::frame_feed::FrameFeed;

#[derive(Error, Debug)]
#[error("camera use-case binding failed: {reason}")]
pub struct BindingError {
    pub reason: String,
}

impl BindingError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The capture subsystem, treated as a black box.
///
/// Once bound it pushes sensor frames into the feed until unbound.
/// `unbind` must stop delivery promptly; frames pushed after the
/// analyzer is gone are silently dropped by the feed.
pub trait CameraSource: Send {
    fn bind(&mut self, feed: FrameFeed) -> Result<(), BindingError>;
    fn unbind(&mut self);
}
