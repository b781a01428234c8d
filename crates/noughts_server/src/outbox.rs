//! Outbound delivery handle for one connection.

use crate::protocol::{ConnectionId, Response};
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Queue of responses bound for a single connection.
///
/// Sending never blocks. The transport drains the receiving half and writes
/// frames in order; once the connection is gone every send reports failure.
#[derive(Debug, Clone)]
pub struct Outbox {
    connection: ConnectionId,
    sender: mpsc::UnboundedSender<Response>,
}

impl Outbox {
    /// Creates an outbox and the receiver the transport should drain.
    pub fn channel(connection: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { connection, sender }, receiver)
    }

    /// Connection this outbox delivers to.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Enqueues a response. Returns `false` if the connection is closed.
    pub fn send(&self, response: Response) -> bool {
        trace!(connection = %self.connection, ?response, "Queueing response");
        match self.sender.send(response) {
            Ok(()) => true,
            Err(_) => {
                warn!(connection = %self.connection, "Dropped response for closed connection");
                false
            }
        }
    }
}
