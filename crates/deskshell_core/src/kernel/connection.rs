//! Server connection contracts and the in-process loopback transport.
//!
//! # Invariants
//! - A closed connection never reopens; reconnecting means a new `connect`.
//! - `on_close` fires at most once per connection.

use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives connection lifecycle callbacks.
pub trait ConnectionListener: Send + Sync {
    fn on_open(&self, uri: &str);
    fn on_close(&self, uri: &str, reason: &str);
}

/// One open server connection.
pub trait Connection: Send + Sync {
    fn uri(&self) -> &str;
    fn is_open(&self) -> bool;
    fn close(&self, reason: &str);
}

/// Opens server connections.
pub trait Transport: Send + Sync {
    fn connect(
        &self,
        uri: &str,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Refused { uri: String, reason: String },
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refused { uri, reason } => write!(f, "connection to {uri} refused: {reason}"),
        }
    }
}

impl Error for TransportError {}

struct LoopbackLink {
    uri: String,
    open: AtomicBool,
    listener: Arc<dyn ConnectionListener>,
}

impl LoopbackLink {
    fn close(&self, reason: &str) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.listener.on_close(&self.uri, reason);
        }
    }
}

struct LoopbackConnection {
    link: Arc<LoopbackLink>,
}

impl Connection for LoopbackConnection {
    fn uri(&self) -> &str {
        &self.link.uri
    }

    fn is_open(&self) -> bool {
        self.link.open.load(Ordering::SeqCst)
    }

    fn close(&self, reason: &str) {
        self.link.close(reason);
    }
}

/// Transport that opens instantly and only closes when told to.
#[derive(Default)]
pub struct LoopbackTransport {
    refuse: Option<String>,
    links: Mutex<Vec<Arc<LoopbackLink>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every `connect` fails with `reason`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            refuse: Some(reason.into()),
            links: Mutex::new(Vec::new()),
        }
    }

    /// URIs of every connection opened so far, open or not.
    pub fn connected_uris(&self) -> Vec<String> {
        self.links
            .lock()
            .iter()
            .map(|link| link.uri.clone())
            .collect()
    }

    /// Closes every open connection from the server side.
    pub fn sever_all(&self, reason: &str) -> usize {
        let links: Vec<_> = self.links.lock().clone();
        let mut closed = 0;
        for link in links {
            if link.open.load(Ordering::SeqCst) {
                link.close(reason);
                closed += 1;
            }
        }
        closed
    }
}

impl Transport for LoopbackTransport {
    fn connect(
        &self,
        uri: &str,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        if let Some(reason) = &self.refuse {
            return Err(TransportError::Refused {
                uri: uri.to_string(),
                reason: reason.clone(),
            });
        }

        let link = Arc::new(LoopbackLink {
            uri: uri.to_string(),
            open: AtomicBool::new(true),
            listener,
        });
        self.links.lock().push(link.clone());
        link.listener.on_open(uri);
        Ok(Box::new(LoopbackConnection { link }))
    }
}
