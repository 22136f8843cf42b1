//! High-level orchestration of the attendance client: the view router, the
//! room-capture session, and the registration workflow.

use rollcall_types::RollcallError;

pub mod registration;
pub mod router;
pub mod session;

pub use registration::{PhotoCapture, RegistrationForm, RegistrationWorkflow};
pub use router::Router;
pub use session::{CaptureSession, CaptureState, ErrorOrigin, Resolution, ScanTicket, SessionInstance};

pub fn orchestrator_error(message: impl Into<String>) -> RollcallError {
    RollcallError::Session(message.into())
}
