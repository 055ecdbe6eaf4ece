// Core modules
pub mod api;
pub mod config;
pub mod models;
pub mod notify;
pub mod pattern;
pub mod scanner;

// Re-export commonly used types
pub use api::{MarketDataSource, SymbolSource};
pub use models::*;
pub use notify::Notifier;
pub use pattern::PatternConfig;
pub use scanner::{ScanOptions, ScanOrchestrator, TimeframeAnalyzer};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
