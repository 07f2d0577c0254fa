pub mod descriptive;

// Re-export commonly used functions
pub use descriptive::{StatsError, Summary, circumference, numbers, summarize};
