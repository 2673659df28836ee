//! Name/number exchange protocol.
//!
//! A single-shot, newline-delimited text protocol. Each connection carries
//! exactly one request and at most one response:
//!
//! ```text
//! Request:  <client name>\n<client number>\n
//! Response: <server name>\n<server number>\n<sum>\n
//!
//! Example:
//! Request:  Client of Test\n7\n
//! Response: Server of Computer Networks\n50\n57\n
//! ```
//!
//! Numbers are signed 64-bit decimal integers. A `\r` before the line feed is
//! tolerated on decode.
//!
//! ## Shutdown sentinel
//!
//! A request whose number is [`SHUTDOWN_SENTINEL`] (zero) is not an arithmetic
//! request: the server begins a graceful shutdown and closes the connection
//! without writing a response.

pub mod parser;
pub mod stream;

pub use parser::{
    encode_request, encode_response, parse_request, parse_response, Identity, ParseResult,
    Request, Response, MAX_MESSAGE_SIZE, SHUTDOWN_SENTINEL,
};
pub use stream::{read_request, read_response};
