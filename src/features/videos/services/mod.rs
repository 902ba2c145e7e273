pub mod video_service;

pub use video_service::{UploadOutcome, VideoService};
