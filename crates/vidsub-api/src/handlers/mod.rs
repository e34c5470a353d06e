pub mod audit;
pub mod playback;
pub mod privacy;
pub mod upload_cleanup;
pub mod upload_confirm;
pub mod upload_retry;
pub mod upload_session;
pub mod upload_status;
