//! Single-shot client.
//!
//! Connects once, sends one request, reads one response and writes a
//! human-readable report. Report lines go to the supplied writer; diagnostics
//! go through `tracing`.

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpSocket};
use tracing::{debug, warn};

use crate::config::ClientArgs;
use crate::error::ClientError;
use crate::protocol::{encode_request, read_response, Request, Response};

/// How a client run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    /// The server answered the request.
    Completed(Response),
    /// The shutdown sentinel was sent and the server closed without replying.
    ShutdownRequested,
}

/// Run one exchange against the server named by `args`.
pub async fn run<W: Write>(
    args: &ClientArgs,
    number: i64,
    out: &mut W,
) -> Result<ClientOutcome, ClientError> {
    let request = Request::new(args.name.clone(), number);
    let encoded = encode_request(&request)?;
    let timeout = args.timeout();

    let address = format!("{}:{}", args.host, args.port);
    let addr = resolve(&address).await?;

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    writeln!(out, "[client] Socket created")?;

    let mut stream = tokio::time::timeout(timeout, socket.connect(addr))
        .await
        .unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {timeout:?}"),
            ))
        })
        .map_err(|source| ClientError::Connect {
            address: address.clone(),
            source,
        })?;
    writeln!(out, "[client] Connected to {address}")?;

    stream.write_all(&encoded).await?;
    writeln!(out, "[client] Sent name and number")?;
    debug!(bytes = encoded.len(), "Request sent");

    let response = tokio::time::timeout(timeout, read_response(&mut stream))
        .await
        .map_err(|_| ClientError::Timeout(timeout))??;

    match response {
        Some(response) => {
            if number.checked_add(response.server_number) != Some(response.sum) {
                warn!(
                    client_number = number,
                    server_number = response.server_number,
                    sum = response.sum,
                    "Server sum does not match the local computation"
                );
            }

            writeln!(out, "[client] Client name: {}", request.client_name)?;
            writeln!(out, "[client] Server name: {}", response.server_name)?;
            writeln!(out, "[client] Client number: {}", request.client_number)?;
            writeln!(out, "[client] Server number: {}", response.server_number)?;
            writeln!(out, "[client] Sum: {}", response.sum)?;
            out.flush()?;
            Ok(ClientOutcome::Completed(response))
        }
        None if request.is_shutdown_request() => {
            writeln!(
                out,
                "[client] Server closed the connection without a reply (shutdown requested)"
            )?;
            out.flush()?;
            Ok(ClientOutcome::ShutdownRequested)
        }
        None => Err(ClientError::ClosedWithoutResponse),
    }
}

/// Read the number to send from the first line of `input`.
pub fn read_number<R: BufRead>(mut input: R) -> Result<i64, ClientError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(ClientError::InvalidInput(
            "expected a number on standard input".to_string(),
        ));
    }

    let trimmed = line.trim();
    trimmed
        .parse()
        .map_err(|_| ClientError::InvalidInput(format!("not an integer: {trimmed:?}")))
}

async fn resolve(address: &str) -> Result<SocketAddr, ClientError> {
    let mut addrs = lookup_host(address)
        .await
        .map_err(|source| ClientError::Resolve {
            address: address.to_string(),
            source,
        })?;

    addrs.next().ok_or_else(|| ClientError::Resolve {
        address: address.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
    })
}
