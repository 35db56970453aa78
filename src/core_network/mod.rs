pub mod network;
pub mod pasv;
pub mod port;

use std::io;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::session::{DataChannel, Session};

/// Collects the data socket for a transfer command, consuming the pending
/// selection. Active mode dials the stored peer address now; passive mode
/// joins the background accept task (which may already have finished if
/// the client connected early). Any failure maps to a 425 reply at the
/// call site instead of a hang.
pub async fn open_data_connection(session: &Arc<Mutex<Session>>) -> io::Result<TcpStream> {
    let channel = {
        let mut session = session.lock().await;
        session.take_data_channel()
    };
    match channel {
        DataChannel::Idle => Err(io::Error::new(
            io::ErrorKind::NotConnected,
            "no data channel selected",
        )),
        DataChannel::Outbound(addr) => TcpStream::connect(addr).await,
        DataChannel::Inbound(accept_task) => match accept_task.await {
            Ok(result) => result,
            Err(join_error) => Err(io::Error::new(io::ErrorKind::Other, join_error)),
        },
    }
}
