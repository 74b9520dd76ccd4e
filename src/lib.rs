pub mod bench;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod errors;
pub mod extract;
pub mod http;
pub mod input;
pub mod platform;
pub mod provision;
pub mod shutdown;
pub mod sink;
pub mod state;
pub mod stats;
pub mod template;
pub mod types;
pub mod wait;

#[cfg(test)]
mod testing;
