//! sum-exchange: a concurrent name/number exchange over TCP
//!
//! A client sends its name and a number; the server answers with its own
//! name, its own number and the sum of both. Sending the number zero asks
//! the server to shut down gracefully.
//!
//! Features:
//! - One tokio task per connection, so concurrent clients never wait on each other
//! - Bounded request reads and bounded shutdown drain
//! - Configuration via CLI arguments or TOML file

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shutdown;
