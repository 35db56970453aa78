use std::io;
use std::net::IpAddr;

use log::info;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};

use crate::core_network::port::{format_eprt_argument, format_port_argument};
use crate::core_proto::{read_reply, ProtoError, Reply, SockBuf};

/// The user-side protocol interpreter: one method per FTP request, each
/// sending the command line and waiting for the server's reply.
pub struct ClientPi {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    buf: SockBuf,
    remote_ip: IpAddr,
    local_ip: IpAddr,
}

impl ClientPi {
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let addr = lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "hostname did not resolve"))?;
        let stream = TcpStream::connect(addr).await?;
        let remote_ip = stream.peer_addr()?.ip();
        let local_ip = stream.local_addr()?.ip();
        info!("Connected to {}", addr);
        let (reader, writer) = stream.into_split();
        Ok(ClientPi {
            reader,
            writer,
            buf: SockBuf::new(),
            remote_ip,
            local_ip,
        })
    }

    /// Peer address of the control connection; EPSV data connections go
    /// back to it.
    pub fn remote_ip(&self) -> IpAddr {
        self.remote_ip
    }

    /// Our own address on the control connection; PORT/EPRT advertise it.
    pub fn local_ip(&self) -> IpAddr {
        self.local_ip
    }

    async fn send_line(&mut self, line: &str, logged: &str) -> Result<(), ProtoError> {
        info!("Sent: {}", logged);
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await?;
        Ok(())
    }

    /// Wait for a reply from the server. 421 means the server is going
    /// away and is always terminal for the session.
    pub async fn wait_for_reply(&mut self) -> Result<Reply, ProtoError> {
        let reply = read_reply(&mut self.buf, &mut self.reader).await?;
        info!("Received: {} {}", reply.code, reply.text);
        if reply.code == 421 {
            return Err(ProtoError::ServiceUnavailable);
        }
        Ok(reply)
    }

    async fn request(&mut self, line: String) -> Result<Reply, ProtoError> {
        self.send_line(&line, &line).await?;
        self.wait_for_reply().await
    }

    pub async fn user(&mut self, username: &str) -> Result<Reply, ProtoError> {
        self.request(format!("USER {}", username)).await
    }

    pub async fn pass(&mut self, password: &str) -> Result<Reply, ProtoError> {
        // Keep the password itself out of the log.
        let line = format!("PASS {}", password);
        self.send_line(&line, "PASS ****").await?;
        self.wait_for_reply().await
    }

    pub async fn quit(&mut self) -> Result<Reply, ProtoError> {
        self.request(String::from("QUIT")).await
    }

    pub async fn help(&mut self, topic: Option<&str>) -> Result<Reply, ProtoError> {
        match topic {
            Some(topic) => self.request(format!("HELP {}", topic)).await,
            None => self.request(String::from("HELP")).await,
        }
    }

    pub async fn pwd(&mut self) -> Result<Reply, ProtoError> {
        self.request(String::from("PWD")).await
    }

    pub async fn syst(&mut self) -> Result<Reply, ProtoError> {
        self.request(String::from("SYST")).await
    }

    pub async fn cwd(&mut self, path: &str) -> Result<Reply, ProtoError> {
        self.request(format!("CWD {}", path)).await
    }

    pub async fn list(&mut self, path: Option<&str>) -> Result<Reply, ProtoError> {
        match path {
            Some(path) => self.request(format!("LIST {}", path)).await,
            None => self.request(String::from("LIST")).await,
        }
    }

    pub async fn retr(&mut self, path: &str) -> Result<Reply, ProtoError> {
        self.request(format!("RETR {}", path)).await
    }

    pub async fn stor(&mut self, path: &str) -> Result<Reply, ProtoError> {
        self.request(format!("STOR {}", path)).await
    }

    pub async fn port(&mut self, addr: std::net::Ipv4Addr, port: u16) -> Result<Reply, ProtoError> {
        self.request(format!("PORT {}", format_port_argument(addr, port)))
            .await
    }

    pub async fn eprt(&mut self, addr: &std::net::SocketAddr) -> Result<Reply, ProtoError> {
        self.request(format!("EPRT {}", format_eprt_argument(addr)))
            .await
    }

    pub async fn pasv(&mut self) -> Result<Reply, ProtoError> {
        self.request(String::from("PASV")).await
    }

    pub async fn epsv(&mut self) -> Result<Reply, ProtoError> {
        self.request(String::from("EPSV")).await
    }
}
