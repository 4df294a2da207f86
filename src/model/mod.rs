pub mod batch;
pub mod image;
pub mod item;
