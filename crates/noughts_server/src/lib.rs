//! Noughts server library - a two-player match server over TCP.
//!
//! # Architecture
//!
//! - **Session**: per-connection authentication state and match association
//! - **Match**: one board, turn order and cumulative score between a host and a guest
//! - **Registry**: live connections, sessions and matches; routes requests to handlers
//! - **Transport**: length-prefixed JSON frames over tokio TCP streams
//!
//! # Example
//!
//! ```no_run
//! use noughts_server::{GameServer, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::load(None)?;
//! GameServer::new(config).run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod codec;
mod config;
mod error;
mod handlers;
mod matchup;
mod outbox;
mod protocol;
mod registry;
mod session;
mod transport;

// Crate-level exports - Wire protocol
pub use codec::{CodecError, DEFAULT_MAX_FRAME_LEN, decode_request, read_frame, write_frame};
pub use protocol::{
    ConnectionId, DRAW, MatchId, Operation, PlayerToken, Position, Request, Response,
};

// Crate-level exports - Core
pub use error::{ErrorKind, ServerError};
pub use matchup::{Match, Score};
pub use outbox::Outbox;
pub use registry::{Registry, SharedMatch};
pub use session::{AuthState, Session};

// Crate-level exports - Server and configuration
pub use config::{ConfigError, HOST_VAR, MAX_FRAME_LEN_VAR, PORT_VAR, ServerConfig};
pub use transport::GameServer;
