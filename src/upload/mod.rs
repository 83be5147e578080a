pub mod orchestrator;

pub use orchestrator::{part_display_name, PartOutcome, UploadOrchestrator, UploadResult};
