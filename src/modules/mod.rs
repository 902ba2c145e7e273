//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the blob storage adapters used by the videos feature.

pub mod storage;
