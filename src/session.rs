//! Per-connection session handling.
//!
//! A session owns one accepted connection for a single exchange: read one
//! request, answer it (or trigger shutdown), close. Errors never escape the
//! session; they are logged and the connection is dropped without a reply.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::protocol::{encode_response, read_request, Identity, Response};
use crate::shutdown::Shutdown;

/// State shared read-only by every session.
#[derive(Debug)]
pub struct SessionContext {
    pub identity: Identity,
    pub shutdown: Arc<Shutdown>,
    pub read_timeout: Duration,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A response was written.
    Answered(Response),
    /// The request carried the shutdown sentinel.
    ShutdownRequested,
    /// The peer connected and closed without sending anything.
    Closed,
    /// The request was rejected or the connection failed; nothing was written.
    Rejected,
}

/// Serve one connection to completion. Runs inside the caller's per-peer span.
pub async fn handle<S>(mut stream: S, ctx: &SessionContext) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match serve(&mut stream, ctx).await {
        Ok(outcome) => {
            // Best effort: the exchange is already complete.
            let _ = stream.shutdown().await;
            outcome
        }
        Err(SessionError::Closed) => {
            debug!("Connection closed without a request");
            SessionOutcome::Closed
        }
        Err(SessionError::Io(e)) => {
            debug!(error = %e, "Connection error");
            SessionOutcome::Rejected
        }
        Err(e) => {
            warn!(error = %e, "Rejecting request");
            SessionOutcome::Rejected
        }
    }
}

async fn serve<S>(stream: &mut S, ctx: &SessionContext) -> Result<SessionOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = tokio::time::timeout(ctx.read_timeout, read_request(stream))
        .await
        .map_err(|_| SessionError::Timeout(ctx.read_timeout))??
        .ok_or(SessionError::Closed)?;

    if request.is_shutdown_request() {
        if ctx.shutdown.trigger() {
            info!(client_name = %request.client_name, "Shutdown requested by client");
        } else {
            debug!(client_name = %request.client_name, "Shutdown already in progress");
        }
        return Ok(SessionOutcome::ShutdownRequested);
    }

    if request.client_name.is_empty() {
        return Err(SessionError::EmptyName);
    }

    let response = Response::for_request(&ctx.identity, &request)?;

    info!(
        client_name = %request.client_name,
        server_name = %response.server_name,
        client_number = request.client_number,
        server_number = response.server_number,
        sum = response.sum,
        "Answering request"
    );

    let encoded = encode_response(&response);
    tokio::time::timeout(ctx.read_timeout, stream.write_all(&encoded))
        .await
        .map_err(|_| SessionError::Timeout(ctx.read_timeout))??;

    Ok(SessionOutcome::Answered(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownState;
    use tokio_test::io::Builder;

    fn context() -> SessionContext {
        SessionContext {
            identity: Identity::default(),
            shutdown: Arc::new(Shutdown::new()),
            read_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_answers_request() {
        let ctx = context();
        let mock = Builder::new()
            .read(b"Client of Test\n7\n")
            .write(b"Server of Computer Networks\n50\n57\n")
            .build();

        match handle(mock, &ctx).await {
            SessionOutcome::Answered(response) => assert_eq!(response.sum, 57),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(ctx.shutdown.state(), ShutdownState::Running);
    }

    #[tokio::test]
    async fn test_sentinel_triggers_shutdown_without_reply() {
        let ctx = context();
        let mock = Builder::new().read(b"Client Bad\n0\n").build();

        assert_eq!(
            handle(mock, &ctx).await,
            SessionOutcome::ShutdownRequested
        );
        assert_eq!(ctx.shutdown.state(), ShutdownState::ShuttingDown);
    }

    #[tokio::test]
    async fn test_sentinel_with_empty_name_still_shuts_down() {
        let ctx = context();
        let mock = Builder::new().read(b"\n0\n").build();

        assert_eq!(
            handle(mock, &ctx).await,
            SessionOutcome::ShutdownRequested
        );
        assert!(ctx.shutdown.should_stop());
    }

    #[tokio::test]
    async fn test_malformed_number_is_rejected() {
        let ctx = context();
        let mock = Builder::new().read(b"Client A\ntwenty\n").build();

        assert_eq!(handle(mock, &ctx).await, SessionOutcome::Rejected);
        assert!(!ctx.shutdown.should_stop());
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let ctx = context();
        let mock = Builder::new().read(b"\n5\n").build();

        assert_eq!(handle(mock, &ctx).await, SessionOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_overflow_is_rejected() {
        let ctx = context();
        let request = format!("Client Max\n{}\n", i64::MAX);
        let mock = Builder::new().read(request.as_bytes()).build();

        assert_eq!(handle(mock, &ctx).await, SessionOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let ctx = context();
        let mock = Builder::new().build();

        assert_eq!(handle(mock, &ctx).await, SessionOutcome::Closed);
    }

    #[tokio::test]
    async fn test_custom_identity() {
        let ctx = SessionContext {
            identity: Identity {
                name: "Other".to_string(),
                number: -10,
            },
            ..context()
        };
        let mock = Builder::new()
            .read(b"Client\n4\n")
            .write(b"Other\n-10\n-6\n")
            .build();

        assert!(matches!(
            handle(mock, &ctx).await,
            SessionOutcome::Answered(_)
        ));
    }
}
