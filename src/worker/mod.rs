pub mod desktop;
pub mod handler;
pub mod types;
