pub mod confidence;
pub mod endpoint;
pub mod error;
pub mod interview;
pub mod name;
pub mod settings;
pub mod speech;

#[cfg(test)]
mod serde_tests;
