pub mod application;
pub mod bridge;
pub mod style;
pub mod types;
