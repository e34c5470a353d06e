//! Domain services behind the HTTP handlers.

pub mod access_gate;
pub mod playback;
pub mod privacy;
pub mod upload_tracker;

pub use access_gate::AccessGate;
pub use playback::PlaybackService;
pub use privacy::PrivacyService;
pub use upload_tracker::UploadTracker;
