//! `formrelay` - a static site server that relays form submissions
//!
//! The HTTP front end serves a small static site and forwards every POSTed
//! form body as a UDP datagram to the message receiver, which decodes it and
//! appends it to a JSON file keyed by receipt time.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod receiver;
pub mod record;
pub mod storage;
pub mod supervisor;
pub mod web;

pub use config::Config;
pub use error::{Error, Result};
pub use listener::{Listener, ListenerKind, ShutdownHandle};
pub use logging::init_logging;
pub use receiver::MessageReceiver;
pub use record::Record;
pub use storage::{RecordStore, Store};
pub use supervisor::{Supervisor, SupervisorState};
pub use web::{RelayClient, Site, WebFrontEnd};
