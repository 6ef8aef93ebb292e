pub mod config;
pub mod dataset;
pub mod discover;
pub mod metadata;
pub mod plot;
pub mod report;
pub mod util;
