//! `beans` - command-line front end for [`beans_lib`].
//!
//! The binary only parses arguments, finds the configuration, sets up
//! logging and renders results; every operation goes through an explicit
//! [`beans_lib::BeanStore`] handle.
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Config file discovery and overrides
//! - [`format`] - Output formatting (text, JSON)
//! - [`logging`] - tracing subscriber setup

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod format;
pub mod logging;

pub use beans_lib::{BeansError, Result};
