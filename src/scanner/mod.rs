pub mod discovery;
pub mod orchestrator;

pub use discovery::RepositoryScanner;
pub use orchestrator::{ScanOrchestrator, ScanProgress, ScanReport};
