//! Periodic monster scanning: frame sources, screenshot persistence and the
//! fixed-interval scan loop built on top of `monscan-cv`.

pub mod capture;
pub mod cli;
pub mod persist;
pub mod scheduler;

pub use capture::{DirectoryFrameSource, FrameSource};
#[cfg(feature = "screen-capture")]
pub use capture::ScreenFrameSource;
pub use persist::{Persistence, ScreenshotWriter};
pub use scheduler::{escalate_interrupts, shutdown_channel, ScanScheduler, ScanState, ScheduleConfig, ShutdownHandle, ShutdownSignal};
