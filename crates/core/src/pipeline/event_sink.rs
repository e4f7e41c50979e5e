use crate::shared::face::FaceRecord;

/// Push-event surface toward the host shell.
///
/// One emission per analyzed frame, empty when no faces were found.
/// The stream never carries errors, only well-formed face records.
pub trait EventSink: Send + Sync {
    fn emit(&self, faces: Vec<FaceRecord>);
}
