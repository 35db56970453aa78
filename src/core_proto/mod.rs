// Shared control-channel protocol engine: buffered byte reading, reply
// framing and command framing. Used by the client PI directly and by the
// server's per-connection command loop.

pub mod command;
pub mod reply;
pub mod sockbuf;

pub use command::{read_command, Command, CommandRead};
pub use reply::{read_reply, Reply};
pub use sockbuf::SockBuf;

use thiserror::Error;

/// Errors that end a control-channel session. Per-command problems
/// (unknown verbs, bad arguments) are not errors at this level; they are
/// reported through [`CommandRead`] so the session can recover.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The peer closed the control connection.
    #[error("control connection closed by peer")]
    Closed,

    /// The peer sent something that cannot be parsed as a reply line.
    /// Fatal on the client: a well-formed server never produces this.
    #[error("malformed reply line: {0}")]
    MalformedReply(String),

    /// The peer announced it is shutting down (reply code 421).
    #[error("service not available, closing control connection")]
    ServiceUnavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
