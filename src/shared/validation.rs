use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating blob names used as a single path segment
    /// No path separators, query/fragment markers or control characters,
    /// and the name must not end with a dot
    /// - Valid: "lecture1", "intro to rust.mp4", "week-01_ownership"
    /// - Invalid: "a/b", "a\\b", "a?b", "a#b", "lecture.", ""
    pub static ref BLOB_NAME_REGEX: Regex =
        Regex::new(r"^[^/\\?#\x00-\x1F\x7F]*[^/\\?#\x00-\x1F\x7F.]$").unwrap();

    /// Regex for metadata values carried as HTTP headers (printable ASCII, may be empty)
    pub static ref PRINTABLE_ASCII_REGEX: Regex = Regex::new(r"^[\x20-\x7E]*$").unwrap();
}
