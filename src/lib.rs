//! Splitdrop - Split remote audio into overlapping segments and distribute
//! them across capped Dropbox subfolders.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (planning, extraction, placement, jobs)
//! - ports/: Trait definitions (media tool, source fetcher, destination store)
//! - adapters/: Concrete implementations (ffmpeg CLI, HTTP fetcher, Dropbox, local fs, HTTP API)
//! - application/: Generic services
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use application::{PipelineSettings, SplitUploadService};
pub use config::ServiceConfig;
pub use domain::{Job, JobError, JobReport, JobRequest};
