pub mod batch;
pub mod editor;
pub mod export;
pub mod gemini;
pub mod gemini_types;
pub mod input;
pub mod presets;
pub mod report;
pub mod runner;
