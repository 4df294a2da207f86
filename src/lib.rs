//! Headless core for AI-assisted batch photo retouching.
//!
//! Loads images, applies one natural-language instruction to each of them
//! through a generative image API, and tracks per-item progress so a front
//! end can show results, retry single items, and export edited files.

pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod services;
