/// Host-side camera permission, specified only at its boundary.
///
/// `request` triggers the platform prompt as a side effect; the answer
/// arrives later through
/// [`DetectionController::on_permission_result`](crate::pipeline::controller::DetectionController::on_permission_result).
pub trait PermissionGate: Send {
    fn granted(&self) -> bool;
    fn request(&self);
}
