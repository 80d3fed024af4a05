//! Report Publishers
//!
//! A report goes out as a two-part message: the topic, then the
//! serialized payload. On the TCP socket each part is a length-prefixed
//! frame (see [`write_frame`](crate::recorder::write_frame)).
//!
//! ## Example
//!
//! ```rust,no_run
//! use specmon_phy::publish::{EnergyPublisher, TcpPublisher};
//!
//! let mut publisher = TcpPublisher::bind("127.0.0.1:8883").unwrap();
//! publisher.publish("topic", b"payload").unwrap();
//! ```

use crate::recorder::write_frame;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot bind publish endpoint {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("publish i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("publish channel disconnected")]
    Disconnected,
}

/// Sink for serialized energy reports.
pub trait EnergyPublisher: Send {
    /// Send one report. Returns the number of subscribers reached.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<usize, PublishError>;
}

/// Default cap on bytes a subscriber may leave unsent.
pub const DEFAULT_MAX_PENDING: usize = 8 * 1024 * 1024;

#[derive(Debug)]
struct Subscriber {
    addr: SocketAddr,
    stream: TcpStream,
    /// Queued frame bytes the socket has not taken yet
    pending: Vec<u8>,
}

impl Subscriber {
    /// Write as much of the backlog as the socket accepts without blocking.
    fn drain(&mut self) -> io::Result<()> {
        while !self.pending.is_empty() {
            match self.stream.write(&self.pending) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Broadcasts reports to every connected TCP subscriber.
///
/// Neither the listener nor the subscriber sockets block: pending
/// connections are accepted right before each publish, and whatever a
/// subscriber socket cannot take immediately is queued for the next
/// publish. A subscriber is dropped when a write fails or when its
/// backlog is still above the pending cap as a new report arrives.
#[derive(Debug)]
pub struct TcpPublisher {
    listener: TcpListener,
    subscribers: Vec<Subscriber>,
    max_pending: usize,
}

impl TcpPublisher {
    pub fn bind(endpoint: &str) -> Result<Self, PublishError> {
        let bind_err = |source| PublishError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let listener = TcpListener::bind(endpoint).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        tracing::info!(endpoint, "energy publisher listening");
        Ok(Self {
            listener,
            subscribers: Vec::new(),
            max_pending: DEFAULT_MAX_PENDING,
        })
    }

    /// Unsent bytes a subscriber may carry before it is dropped.
    pub fn set_max_pending(&mut self, bytes: usize) {
        self.max_pending = bytes;
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Accept every connection waiting on the listener.
    pub fn accept_pending(&mut self) -> io::Result<usize> {
        let mut accepted = 0;
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(true)?;
                    stream.set_nodelay(true)?;
                    tracing::debug!(%addr, "subscriber connected");
                    self.subscribers.push(Subscriber {
                        addr,
                        stream,
                        pending: Vec::new(),
                    });
                    accepted += 1;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(accepted),
                Err(e) => return Err(e),
            }
        }
    }
}

impl EnergyPublisher for TcpPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<usize, PublishError> {
        self.accept_pending()?;

        let max_pending = self.max_pending;
        self.subscribers.retain_mut(|subscriber| {
            if subscriber.pending.len() > max_pending {
                tracing::warn!(
                    addr = %subscriber.addr,
                    pending = subscriber.pending.len(),
                    "dropping slow subscriber"
                );
                return false;
            }

            let queued = write_frame(&mut subscriber.pending, topic.as_bytes())
                .and_then(|_| write_frame(&mut subscriber.pending, payload))
                .and_then(|_| subscriber.drain());
            match queued {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(addr = %subscriber.addr, error = %e, "dropping subscriber");
                    false
                }
            }
        });

        Ok(self.subscribers.len())
    }
}

/// A report handed to an in-process consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReport {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Forwards reports over an `mpsc` channel.
#[derive(Debug)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<PublishedReport>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::Receiver<PublishedReport>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EnergyPublisher for ChannelPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<usize, PublishError> {
        self.tx
            .send(PublishedReport {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            })
            .map_err(|_| PublishError::Disconnected)?;
        Ok(1)
    }
}
