//! dstat - status line daemon with a FIFO message channel
//!
//! A single server process renders CPU, memory, volume, lock/sleep
//! indicators and a clock into the X root window name. Short-lived client
//! invocations of the same binary push messages through a named pipe to
//! temporarily replace that line, or to shut the server down.
//!
//! # Architecture
//!
//! - **Server**: owns `<tmp>/<name>.pid` and the FIFO `<tmp>/<name>`, ticks
//!   once per interval, polls the FIFO without blocking
//! - **Clients**: check the pid record, write exactly one frame, exit
//!
//! # Wire format
//!
//! `base64("COMMAND:DELAY:PAYLOAD") + "\n"`, see [`codec`].

pub mod error;
pub mod config;
pub mod logging;
pub mod format;
pub mod codec;
pub mod registry;
pub mod channel;
pub mod metrics;
pub mod readouts;
pub mod status;
pub mod display;
pub mod server;
pub mod client;

pub use error::{DstatError, Result};
pub use config::{Config, OverrideMode};
pub use codec::{Command, Message};
pub use server::Server;
pub use client::Intent;
