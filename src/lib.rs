//! assetforge: resumable batch generation of catalog images
//!
//! Drives a slow, rate-limited image service over a large work set. Progress is
//! recorded durably after every item, so any run can be interrupted and
//! restarted without redoing finished work or spending quota twice.

pub mod catalog;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod error_log;
pub mod generation;
pub mod key;
pub mod logging;
pub mod manifest;
pub mod persist;
pub mod pipeline;
pub mod prompts;
pub mod rate_limit;
pub mod reference;
pub mod retry;
