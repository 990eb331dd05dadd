pub mod assets;
pub mod config;
pub mod error;
pub mod map;
pub mod math;
pub mod undo;
