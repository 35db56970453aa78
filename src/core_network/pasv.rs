use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

/// Sets up a passive-mode listener on an ephemeral port of the
/// configured address. Returns the listener and the port it landed on.
pub async fn setup_pasv_listener(pasv_ip: IpAddr) -> io::Result<(TcpListener, u16)> {
    let listener = TcpListener::bind((pasv_ip, 0)).await?;
    let port = listener.local_addr()?.port();
    debug!("Passive listener set up on {}:{}", pasv_ip, port);
    Ok((listener, port))
}

/// Accepts one connection on the passive listener and hands the socket
/// back. Runs on a background task so the control channel keeps going;
/// the listener is dropped (closed) as soon as the connection lands.
pub async fn accept_data_connection(listener: TcpListener) -> io::Result<TcpStream> {
    let (data_stream, addr) = listener.accept().await?;
    debug!("Accepted data connection from {}", addr);
    Ok(data_stream)
}

/// 227 reply text: the address and port encoded like a PORT argument,
/// wrapped in parentheses.
pub fn format_pasv_reply(addr: Ipv4Addr, port: u16) -> String {
    let octets = addr.octets();
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        (port & 0xff00) >> 8,
        port & 0x00ff
    )
}

/// 229 reply text: only the port; the client reuses the control
/// connection's peer address.
pub fn format_epsv_reply(port: u16) -> String {
    format!("Entering Extended Passive Mode (|||{}|).", port)
}

/// Handles the PASV (Passive Mode) FTP command.
///
/// Opens the listener, parks an accept on a background task and only then
/// tells the client where to connect, so the client may dial any time
/// between this reply and the transfer command.
pub async fn handle_pasv_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    {
        let session = session.lock().await;
        if !session.is_authenticated {
            return send_reply(&writer, 530, "Must be authenticated to run this command.").await;
        }
        if session.epsv_only {
            return send_reply(&writer, 522, "PASV not allowed after EPSV ALL.").await;
        }
    }
    if !config.server.pasv_mode {
        return send_reply(&writer, 502, "PASV is disabled on this server.").await;
    }

    let pasv_ip: Ipv4Addr = match config.server.pasv_address.parse() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Bad pasv_address {:?}: {}", config.server.pasv_address, e);
            return send_reply(
                &writer,
                451,
                "Requested action aborted: local error in processing.",
            )
            .await;
        }
    };

    match setup_pasv_listener(IpAddr::V4(pasv_ip)).await {
        Ok((listener, port)) => {
            let accept_task = tokio::spawn(accept_data_connection(listener));
            {
                let mut session = session.lock().await;
                session.set_inbound(accept_task, false);
                info!("Conn {}: passive listener on port {}", session.id, port);
            }
            send_reply(&writer, 227, &format_pasv_reply(pasv_ip, port)).await
        }
        Err(e) => {
            warn!("Failed to open passive listener: {}", e);
            send_reply(&writer, 425, "Can't open data connection.").await
        }
    }
}

/// Handles the EPSV (Extended Passive Mode) FTP command.
///
/// `EPSV ALL` pins the session to extended passive mode for its
/// remainder and invalidates any pending data-channel selection. An
/// address-family argument other than 1 or 2 is refused.
pub async fn handle_epsv_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    {
        let session = session.lock().await;
        if !session.is_authenticated {
            return send_reply(&writer, 530, "Must be authenticated to run this command.").await;
        }
    }
    if !config.server.pasv_mode {
        return send_reply(&writer, 502, "EPSV is disabled on this server.").await;
    }

    if arg.eq_ignore_ascii_case("ALL") {
        let mut session = session.lock().await;
        session.mark_epsv_only();
        info!("Conn {}: EPSV ALL, session pinned to extended passive", session.id);
        return send_reply(&writer, 200, "EPSV ALL ok.").await;
    }

    let pasv_ip: IpAddr = match config.server.pasv_address.parse() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Bad pasv_address {:?}: {}", config.server.pasv_address, e);
            return send_reply(
                &writer,
                451,
                "Requested action aborted: local error in processing.",
            )
            .await;
        }
    };
    // The wire family codes are 1 and 2, distinct from any OS constant.
    let family_ok = match arg.as_str() {
        "" => true,
        "1" => pasv_ip.is_ipv4(),
        "2" => pasv_ip.is_ipv6(),
        _ => false,
    };
    if !family_ok {
        return send_reply(&writer, 522, "Network protocol not supported, use (1,2).").await;
    }

    match setup_pasv_listener(pasv_ip).await {
        Ok((listener, port)) => {
            let accept_task = tokio::spawn(accept_data_connection(listener));
            {
                let mut session = session.lock().await;
                session.set_inbound(accept_task, true);
                info!(
                    "Conn {}: extended passive listener on port {}",
                    session.id, port
                );
            }
            send_reply(&writer, 229, &format_epsv_reply(port)).await
        }
        Err(e) => {
            warn!("Failed to open passive listener: {}", e);
            send_reply(&writer, 425, "Can't open data connection.").await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_reply_encodes_address_and_port_bytes() {
        let text = format_pasv_reply(Ipv4Addr::new(192, 168, 1, 9), 0x1234);
        assert_eq!(text, "Entering Passive Mode (192,168,1,9,18,52).");
    }

    #[test]
    fn epsv_reply_carries_only_the_port() {
        assert_eq!(
            format_epsv_reply(6446),
            "Entering Extended Passive Mode (|||6446|)."
        );
    }

    #[tokio::test]
    async fn accept_task_hands_over_the_connected_socket() {
        let (listener, port) = setup_pasv_listener("127.0.0.1".parse().unwrap())
            .await
            .unwrap();
        let accept_task = tokio::spawn(accept_data_connection(listener));

        let client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let server_side = accept_task.await.unwrap().unwrap();
        assert_eq!(
            server_side.peer_addr().unwrap().port(),
            client.local_addr().unwrap().port()
        );
    }
}
