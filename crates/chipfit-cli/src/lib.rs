//! chipfit CLI library.
//!
//! Process context, logging and Ctrl-C setup, and the command implementations behind
//! the `chipfit` binary.

pub mod commands;
pub mod context;
pub mod interrupt;
pub mod logging;
