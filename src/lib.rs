pub mod api;
pub mod error;
pub mod playback;
pub mod scene;
pub mod session;
pub mod video;

pub use error::{Result, VideoError};
