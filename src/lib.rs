pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod storage;
pub mod thumbnail;
