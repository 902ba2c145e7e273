// =============================================================================
// CONTAINER CONSTANTS
// =============================================================================

/// Default container holding the live videos
pub const DEFAULT_VIDEO_CONTAINER: &str = "videos";

/// Default container receiving archived copies
pub const DEFAULT_ARCHIVE_CONTAINER: &str = "videos-archive";

// =============================================================================
// METADATA CONSTANTS
// =============================================================================

/// Blob metadata key for the video title
pub const METADATA_KEY_TITLE: &str = "title";

/// Blob metadata key for the video description
pub const METADATA_KEY_DESCRIPTION: &str = "description";
