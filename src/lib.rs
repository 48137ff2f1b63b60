//! Run a command with temporary AWS assumed-role credentials.
//!
//! A session token obtained with an MFA code is cached per profile under
//! `~/.runas/cache` and reused until it expires. Each invocation exchanges it
//! for role credentials and hands those to the child process through its
//! environment.

pub mod aws;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod environment;
pub mod error;
pub mod launcher;
pub mod prompt;

pub use error::Error;
