//! Command line client for callscope
//!
//! The binary parses [`cli::Cli`], loads configuration and hands the command
//! to [`app::App`], which renders results as tables or JSON.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod app;
pub mod cli;
pub mod demo;
pub mod output;

pub use app::App;
pub use cli::{Cli, Commands, OutputFormat};
