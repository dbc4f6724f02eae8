//! Credcheck Storage Library
//!
//! This crate provides the asset store abstraction used to publish local
//! certificate files, an HTTP implementation speaking the Cloudinary-style
//! unsigned upload protocol, and the [`UploadCoordinator`] that drives one
//! upload while reporting monotonic progress.
//!
//! # Progress
//!
//! Progress travels over a `tokio::sync::mpsc` channel as integer
//! percentages. Values are strictly increasing, start at 0 and, for a
//! successful upload, the last value sent before the result resolves is 100.

pub mod cloud;
pub mod coordinator;
pub mod progress;
pub mod traits;

// Re-export commonly used types
pub use cloud::CloudAssetStore;
pub use coordinator::UploadCoordinator;
pub use progress::ProgressReporter;
pub use traits::{AssetStore, UploadError, UploadResult};
