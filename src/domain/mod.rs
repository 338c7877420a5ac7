//! Domain layer - Pure business logic.

pub mod destination;
pub mod encode;
pub mod error;
pub mod jobs;
pub mod plan;
pub mod source;

pub use error::JobError;
pub use jobs::{Job, JobReport, JobRequest, SegmentDescriptor, UploadRecord};
