use std::io;
use std::net::{IpAddr, SocketAddr};

use log::warn;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::ftp::ClientPi;
use crate::core_network::port::parse_port_argument;
use crate::core_proto::ProtoError;

/// Which of the four data-channel addressing modes the next transfer will
/// use. Owned by the REPL and only changed by its `passive`/`extended`
/// toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferCtx {
    /// When set, the client initiates the data connection (PASV/EPSV).
    pub passive: bool,
    /// When set, use the extended command forms (EPRT/EPSV).
    pub extended: bool,
}

enum DataConnInner {
    /// Passive modes connect during negotiation.
    Connected(TcpStream),
    /// Active modes listen locally; the accept finishes once the server
    /// dials in during the transfer command.
    Pending(JoinHandle<io::Result<TcpStream>>),
}

/// A data connection in the making. Dropping it without collecting the
/// stream cancels a still-pending accept so no listener is leaked.
pub struct DataConn {
    inner: Option<DataConnInner>,
}

impl DataConn {
    pub async fn into_stream(mut self) -> io::Result<TcpStream> {
        match self.inner.take() {
            Some(DataConnInner::Connected(stream)) => Ok(stream),
            Some(DataConnInner::Pending(accept_task)) => match accept_task.await {
                Ok(result) => result,
                Err(join_error) => Err(io::Error::new(io::ErrorKind::Other, join_error)),
            },
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "already consumed")),
        }
    }
}

impl Drop for DataConn {
    fn drop(&mut self) {
        if let Some(DataConnInner::Pending(accept_task)) = &self.inner {
            accept_task.abort();
        }
    }
}

/// Pulls the host/port tuple out of a 227 reply text, e.g.
/// `Entering Passive Mode (h1,h2,h3,h4,p1,p2).`
pub fn parse_pasv_reply(text: &str) -> Option<SocketAddr> {
    let inner = text.split('(').nth(1)?.split(')').next()?;
    parse_port_argument(inner)
}

/// Pulls the port out of a 229 reply text, e.g.
/// `Entering Extended Passive Mode (|||6446|).`
pub fn parse_epsv_reply(text: &str) -> Option<u16> {
    let inner = text.split('(').nth(1)?.split(')').next()?;
    let parts: Vec<&str> = inner.split('|').collect();
    if parts.len() != 5 {
        return None;
    }
    parts[3].parse().ok()
}

/// Runs the client half of the data-channel negotiation for the selected
/// mode. Returns `None` (after telling the user) when the server refused
/// or the sockets could not be set up; protocol-level failures bubble up.
pub async fn establish(pi: &mut ClientPi, ctx: &TransferCtx) -> Result<Option<DataConn>, ProtoError> {
    if ctx.passive {
        establish_passive(pi, ctx.extended).await
    } else {
        establish_active(pi, ctx.extended).await
    }
}

async fn establish_passive(pi: &mut ClientPi, extended: bool) -> Result<Option<DataConn>, ProtoError> {
    let reply = if extended { pi.epsv().await? } else { pi.pasv().await? };
    if !reply.is_completion() {
        println!("Error executing command. See log");
        return Ok(None);
    }
    let addr = if extended {
        match parse_epsv_reply(&reply.text) {
            Some(port) => SocketAddr::new(pi.remote_ip(), port),
            None => return Err(ProtoError::MalformedReply(reply.text)),
        }
    } else {
        match parse_pasv_reply(&reply.text) {
            Some(addr) => addr,
            None => return Err(ProtoError::MalformedReply(reply.text)),
        }
    };
    println!("{}", reply.text);
    match TcpStream::connect(addr).await {
        Ok(stream) => Ok(Some(DataConn {
            inner: Some(DataConnInner::Connected(stream)),
        })),
        Err(e) => {
            warn!("Failed to connect to server-DTP at {}: {}", addr, e);
            println!("Failed to open a data connection");
            Ok(None)
        }
    }
}

async fn establish_active(pi: &mut ClientPi, extended: bool) -> Result<Option<DataConn>, ProtoError> {
    let listener = match TcpListener::bind(SocketAddr::new(pi.local_ip(), 0)).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("Failed to open a local data listener: {}", e);
            println!("Failed to open a data connection");
            return Ok(None);
        }
    };
    let port = listener.local_addr()?.port();
    let accept_task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        Ok(stream)
    });
    let conn = DataConn {
        inner: Some(DataConnInner::Pending(accept_task)),
    };

    let reply = if extended {
        let addr = SocketAddr::new(pi.local_ip(), port);
        pi.eprt(&addr).await?
    } else {
        match pi.local_ip() {
            IpAddr::V4(v4) => pi.port(v4, port).await?,
            IpAddr::V6(_) => {
                println!("PORT needs an IPv4 local address; enable extended mode");
                return Ok(None);
            }
        }
    };
    if !reply.is_completion() {
        println!("Error executing command. See log");
        return Ok(None);
    }
    Ok(Some(conn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::pasv::{format_epsv_reply, format_pasv_reply};
    use std::net::Ipv4Addr;

    #[test]
    fn pasv_reply_round_trips() {
        let text = format_pasv_reply(Ipv4Addr::new(10, 7, 3, 1), 40001);
        let addr = parse_pasv_reply(&text).unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 7, 3, 1)), 40001));
    }

    #[test]
    fn epsv_reply_round_trips() {
        let text = format_epsv_reply(6446);
        assert_eq!(parse_epsv_reply(&text), Some(6446));
    }

    #[test]
    fn malformed_reply_texts_are_rejected() {
        assert!(parse_pasv_reply("Entering Passive Mode").is_none());
        assert!(parse_pasv_reply("nothing here (1,2,3)").is_none());
        assert!(parse_epsv_reply("Entering Extended Passive Mode (|6446|)").is_none());
        assert!(parse_epsv_reply("no port (|||x|)").is_none());
    }
}
