pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod split;
pub mod telegram;
pub mod upload;

pub use config::Config;
pub use error::{Result, TgsplitError};
pub use pipeline::{
    print_summary, upload_file, upload_file_with, Collaborators, PipelineConfig, PipelineResult,
    PipelineStats,
};
