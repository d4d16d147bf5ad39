pub mod engine;
pub mod exporter;
pub mod subtitles;
