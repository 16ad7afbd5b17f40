pub mod audio;
pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stt;
pub mod transcript;

pub use config::{Config, ProcessingOptions, RedactionMethod};
pub use error::{Result, ScrubError};
pub use pipeline::{
    print_summary, redact_recording, JobOutcome, PipelineConfig, ProcessingResult, RedactionStats,
};
