//! Switchboard realtime core library.
//! Tracks live authenticated connections, their room subscriptions, and
//! fans chat events out to exactly the sessions that should see them.
//! The HTTP/WebSocket transport and durable storage live outside this
//! crate and plug in through the `store` traits and `ConnectionHandle`.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod fanout;
pub mod model;
pub mod rooms;
pub mod session;
pub mod state;
pub mod store;

pub use config::CoreConfig;
pub use session::lifecycle::Session;
pub use session::ConnectionHandle;
pub use state::CoreState;
