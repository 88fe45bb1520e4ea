pub mod capture;
pub mod clock;

pub use capture::{CaptureGuard, CaptureSource, CaptureStream, DirectoryCapture, NoCamera};
pub use clock::{Clock, ClockKind, ClockPulse, ClockState, TickOutcome};
