//! Application layer - Generic services that use ports.

pub mod pipeline;

pub use pipeline::{PipelineSettings, SplitUploadService};
