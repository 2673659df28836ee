//! TCP server: accepts connections and dispatches each to its own session task.
//!
//! The accept loop never waits on a session. Once shutdown is triggered it
//! stops accepting, drains in-flight sessions for a bounded time and returns.

use crate::config::Config;
use crate::session::{self, SessionContext};
use crate::shutdown::Shutdown;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Listen backlog for the server socket
const LISTEN_BACKLOG: i32 = 1024;

/// Pause after a failed accept before retrying
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Server instance bound to its listening socket
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<SessionContext>,
    connection_limit: Arc<Semaphore>,
    drain_timeout: Duration,
}

impl Server {
    /// Bind the listening socket. Failure here is the only fatal server error.
    pub async fn bind(config: &Config, shutdown: Arc<Shutdown>) -> io::Result<Self> {
        let address = config.listen_address();
        let addr = lookup_host(&address).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address found for {address}"),
            )
        })?;

        let listener = TcpListener::from_std(create_listener(addr)?)?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Server listening");

        Ok(Server {
            listener,
            local_addr,
            context: Arc::new(SessionContext {
                identity: config.identity.clone(),
                shutdown,
                read_timeout: config.read_timeout,
            }),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            drain_timeout: config.drain_timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until shutdown is triggered, then drain sessions.
    pub async fn run(self) {
        let Server {
            listener,
            context,
            connection_limit,
            drain_timeout,
            ..
        } = self;
        let shutdown = Arc::clone(&context.shutdown);
        let mut sessions = JoinSet::new();

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                permit = connection_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let accepted = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let Some(stream) = admit(stream, peer, &shutdown) else {
                        break;
                    };
                    debug!(%peer, "New connection");

                    let context = Arc::clone(&context);
                    let span = info_span!("session", %peer);
                    sessions.spawn(
                        async move {
                            let outcome = session::handle(stream, &context).await;
                            debug!(?outcome, "Session finished");
                            drop(permit);
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }

            while let Some(result) = sessions.try_join_next() {
                log_join_error(result);
            }
        }

        drop(listener);
        info!(in_flight = sessions.len(), "Shutting down");

        let drain = async {
            while let Some(result) = sessions.join_next().await {
                log_join_error(result);
            }
        };
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            warn!(
                remaining = sessions.len(),
                "Drain timeout elapsed, aborting sessions"
            );
            sessions.shutdown().await;
        }

        shutdown.mark_stopped();
        info!("Server stopped");
    }
}

/// Drop a connection that raced with shutdown instead of serving it.
fn admit(stream: TcpStream, peer: SocketAddr, shutdown: &Shutdown) -> Option<TcpStream> {
    if shutdown.should_stop() {
        debug!(%peer, "Refusing connection during shutdown");
        return None;
    }
    Some(stream)
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "Session task panicked");
        }
    }
}

/// Create the listening socket with address reuse so restarts can rebind
/// while old connections sit in TIME_WAIT.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
