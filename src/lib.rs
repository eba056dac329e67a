//! Remote nine-patch loader.
//!
//! Resolves a URL to a cached file (downloading it once if needed), decodes
//! it at the display density, and hands back either a stretchable nine-patch
//! drawable or a plain bitmap. Results are dropped once the requesting owner
//! has been torn down.

pub mod api;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod source;

pub use config::LoaderConfig;
pub use engine::decoder::DecodedArtifact;
pub use engine::session::{LoadCallback, LoadSession, LoadStart, UrlRewrite};
pub use error::{DownloadError, LoadError};
pub use lifecycle::{LifecycleGate, LifecycleRegistry, LifecycleSource, LifecycleState};
pub use source::http_source::HttpDownloadService;
pub use source::traits::DownloadService;
