//! Connection lifecycle with bounded retries.
//!
//! [`Transport`] dials a stream URL, forwards every data frame to a sink,
//! and redials after read failures. Dial failures and read failures draw
//! from one attempt counter, so a connection that flaps right after
//! reconnecting cannot exceed the retry budget. A successful read resets
//! the counter. When the budget is spent the sink is dropped, which ends
//! the consumer's sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{Connection, Dialer};
use crate::Result;
use crate::error::AgentError;

/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default pause between attempts.
pub const DEFAULT_BACK_OFF: Duration = Duration::from_secs(5);

/// Retry policy shared by the dial and read phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    pub max_retries: u32,
    pub back_off: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            back_off: DEFAULT_BACK_OFF,
        }
    }
}

/// Reconnecting frame source built on a [`Dialer`].
pub struct Transport<D> {
    dialer: Arc<D>,
    options: SocketOptions,
}

impl<D: Dialer> Transport<D> {
    #[must_use]
    pub fn new(dialer: D, options: SocketOptions) -> Self {
        Self {
            dialer: Arc::new(dialer),
            options,
        }
    }

    /// Connects to `url` and starts forwarding frames into `sink`.
    ///
    /// The initial dial phase runs before this returns. On success the read
    /// loop continues in a background task. `attempt` is the number of
    /// attempts already consumed from the retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ConnectionFailed`] if every dial attempt fails.
    /// `sink` is dropped in that case, so its receiver sees the end of the
    /// sequence.
    pub async fn connect_and_listen(
        &self,
        url: &str,
        sink: mpsc::Sender<Vec<u8>>,
        attempt: u32,
    ) -> Result<()> {
        let (conn, attempt) = dial(self.dialer.as_ref(), &self.options, url, attempt).await?;

        tokio::spawn(listen(
            Arc::clone(&self.dialer),
            self.options.clone(),
            url.to_string(),
            conn,
            sink,
            attempt,
        ));

        Ok(())
    }
}

/// Dials until a connection is established or the budget is spent.
///
/// Returns the connection together with the attempt count it consumed.
async fn dial<D: Dialer>(
    dialer: &D,
    options: &SocketOptions,
    url: &str,
    mut attempt: u32,
) -> Result<(D::Connection, u32)> {
    info!("connecting to {url}");

    loop {
        match dialer.dial(url).await {
            Ok(conn) => {
                info!("successfully connected to {url}");
                return Ok((conn, attempt));
            }
            Err(e) => {
                error!(error = %e, attempt, url, "connection error");
                if attempt >= options.max_retries {
                    error!(url, "max retries reached");
                    return Err(AgentError::ConnectionFailed {
                        url: url.to_string(),
                    });
                }
                attempt += 1;
                tokio::time::sleep(options.back_off).await;
            }
        }
    }
}

/// Read loop for one stream URL.
///
/// Owns the sink for the lifetime of the stream; returning drops it.
async fn listen<D: Dialer>(
    dialer: Arc<D>,
    options: SocketOptions,
    url: String,
    mut conn: D::Connection,
    sink: mpsc::Sender<Vec<u8>>,
    mut attempt: u32,
) {
    loop {
        let read = tokio::select! {
            read = conn.read_frame() => Some(read),
            () = sink.closed() => None,
        };

        let Some(read) = read else {
            debug!(url = %url, "Frame consumer dropped, closing connection");
            conn.close().await;
            return;
        };

        match read {
            Ok(frame) => {
                attempt = 0;
                if sink.send(frame).await.is_err() {
                    debug!(url = %url, "Frame consumer dropped, closing connection");
                    conn.close().await;
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, url = %url, "error on read");
                conn.close().await;

                if attempt >= options.max_retries {
                    error!(url = %url, "max retries reached");
                    return;
                }
                attempt += 1;
                tokio::time::sleep(options.back_off).await;

                match dial(dialer.as_ref(), &options, &url, attempt).await {
                    Ok((next, consumed)) => {
                        conn = next;
                        attempt = consumed;
                    }
                    Err(_) => return,
                }
            }
        }
    }
}
