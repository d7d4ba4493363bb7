pub mod constants;
pub mod local;
pub mod platform;
pub mod registration;
pub mod service;
pub mod status;
pub mod types;
