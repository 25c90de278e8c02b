pub mod auth;
pub mod clock;
pub mod codec;
pub mod config;
pub mod jobs;
pub mod model;
pub mod server;
pub mod session;
pub mod sync;
pub mod workflow;

#[cfg(test)]
mod testing;
