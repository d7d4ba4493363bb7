pub mod browser;
pub mod btle;
pub mod console;
pub mod constants;
pub mod platform;
pub mod resolve;
pub mod types;

#[cfg(test)]
pub mod fake;
