pub mod auth;
pub mod config;
pub mod context;
pub mod prompts;
pub mod review;
pub mod sync;
