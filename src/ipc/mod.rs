//! IPC between the daemon and UI clients.
//!
//! JSON Lines over a Unix stream socket. Clients send one tagged request per
//! line and read one tagged response; a subscribed client additionally
//! receives push events as the session changes.

pub mod client;
pub mod messages;
pub mod server;

pub use client::{IpcClient, IpcClientConfig};
pub use messages::{Event, Request, Response};
pub use server::{IpcServer, IpcServerConfig, RequestHandler};
