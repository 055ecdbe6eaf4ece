// Scan engine
pub mod analyzer;
pub mod orchestrator;

pub use analyzer::TimeframeAnalyzer;
pub use orchestrator::{scan_symbol, ScanOptions, ScanOrchestrator};
