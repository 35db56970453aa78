use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::{info, warn};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::core_ftpcommand::utils::send_reply;
use crate::session::Session;
use crate::Config;

/// Parses a PORT argument: exactly six comma-separated decimal fields,
/// four address octets (at most three digits each) and the two port
/// bytes, combined as `(msb << 8) | lsb`.
pub fn parse_port_argument(arg: &str) -> Option<SocketAddr> {
    let parts: Vec<&str> = arg.split(',').collect();
    if parts.len() != 6 {
        return None;
    }
    for part in &parts[..4] {
        if part.is_empty() || part.len() > 3 {
            return None;
        }
    }
    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(&parts[..4]) {
        *slot = part.parse().ok()?;
    }
    let msb: u8 = parts[4].parse().ok()?;
    let lsb: u8 = parts[5].parse().ok()?;
    let port = ((msb as u16) << 8) | lsb as u16;
    Some(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3])),
        port,
    ))
}

/// Formats an address the way PORT wants it: `h1,h2,h3,h4,p1,p2`.
pub fn format_port_argument(addr: Ipv4Addr, port: u16) -> String {
    let octets = addr.octets();
    format!(
        "{},{},{},{},{},{}",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        (port & 0xff00) >> 8,
        port & 0x00ff
    )
}

#[derive(Debug, PartialEq, Eq)]
pub enum EprtError {
    Malformed,
    /// Family code other than 1 (IPv4) or 2 (IPv6).
    UnsupportedFamily,
}

/// Parses an EPRT argument: `|<family>|<address>|<port>|` with family 1
/// for IPv4 and 2 for IPv6. The wire family code is translated to the
/// address type here and nowhere else.
pub fn parse_eprt_argument(arg: &str) -> Result<SocketAddr, EprtError> {
    let parts: Vec<&str> = arg.split('|').collect();
    if parts.len() != 5 || !parts[0].is_empty() || !parts[4].is_empty() {
        return Err(EprtError::Malformed);
    }
    let ip: IpAddr = match parts[1] {
        "1" => IpAddr::V4(parts[2].parse().map_err(|_| EprtError::Malformed)?),
        "2" => IpAddr::V6(parts[2].parse().map_err(|_| EprtError::Malformed)?),
        _ => return Err(EprtError::UnsupportedFamily),
    };
    let port: u16 = parts[3].parse().map_err(|_| EprtError::Malformed)?;
    Ok(SocketAddr::new(ip, port))
}

/// Formats an EPRT argument for the given address.
pub fn format_eprt_argument(addr: &SocketAddr) -> String {
    let family = match addr.ip() {
        IpAddr::V4(_) => 1,
        IpAddr::V6(_) => 2,
    };
    format!("|{}|{}|{}|", family, addr.ip(), addr.port())
}

/// Handles the PORT (Active Mode) FTP command.
///
/// Stores the peer-advertised address; the actual dial happens when the
/// transfer command runs.
pub async fn handle_port_command(
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
        if session.epsv_only {
            return send_reply(&writer, 522, "PORT not allowed after EPSV ALL.").await;
        }
    }
    if !config.server.port_mode {
        return send_reply(&writer, 502, "PORT is disabled on this server.").await;
    }

    match parse_port_argument(&arg) {
        Some(addr) => {
            let mut session = session.lock().await;
            info!("Conn {}: PORT address is {}", session.id, addr);
            session.set_outbound(addr, false);
            send_reply(&writer, 200, "Command okay.").await
        }
        None => {
            warn!("Malformed PORT argument: {:?}", arg);
            send_reply(&writer, 501, "Malformed PORT command.").await
        }
    }
}

/// Handles the EPRT (Extended Active Mode) FTP command.
pub async fn handle_eprt_command(
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
        if session.epsv_only {
            return send_reply(&writer, 522, "EPRT not allowed after EPSV ALL.").await;
        }
    }
    if !config.server.port_mode {
        return send_reply(&writer, 502, "EPRT is disabled on this server.").await;
    }

    match parse_eprt_argument(&arg) {
        Ok(addr) => {
            let mut session = session.lock().await;
            info!("Conn {}: EPRT address is {}", session.id, addr);
            session.set_outbound(addr, true);
            send_reply(&writer, 200, "Command okay.").await
        }
        Err(EprtError::UnsupportedFamily) => {
            send_reply(&writer, 522, "Network protocol not supported, use (1,2).").await
        }
        Err(EprtError::Malformed) => {
            warn!("Malformed EPRT argument: {:?}", arg);
            send_reply(&writer, 501, "Malformed EPRT command.").await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_argument_round_trips_for_every_port() {
        let ip = Ipv4Addr::new(132, 235, 1, 2);
        for port in 0u16..=65535 {
            let encoded = format_port_argument(ip, port);
            let decoded = parse_port_argument(&encoded).expect("round trip must parse");
            assert_eq!(decoded.ip(), IpAddr::V4(ip));
            assert_eq!(decoded.port(), port);
        }
    }

    #[test]
    fn port_argument_rejects_malformed_input() {
        assert!(parse_port_argument("10,0,0,1,4").is_none()); // five fields
        assert!(parse_port_argument("10,0,0,1,4,1,9").is_none()); // seven fields
        assert!(parse_port_argument("1000,0,0,1,4,1").is_none()); // octet too long
        assert!(parse_port_argument("10,0,0,x,4,1").is_none()); // non-numeric
        assert!(parse_port_argument("10,0,0,1,300,1").is_none()); // port byte > 255
        assert!(parse_port_argument("").is_none());
    }

    #[test]
    fn eprt_argument_parses_both_families() {
        let v4 = parse_eprt_argument("|1|132.235.1.2|6275|").unwrap();
        assert_eq!(v4, "132.235.1.2:6275".parse().unwrap());

        let v6 = parse_eprt_argument("|2|1080::8:800:200C:417A|5282|").unwrap();
        assert_eq!(v6.port(), 5282);
        assert!(v6.is_ipv6());
    }

    #[test]
    fn eprt_argument_rejects_bad_forms() {
        assert_eq!(
            parse_eprt_argument("|3|1080::8:800:200C:417A|5282|"),
            Err(EprtError::UnsupportedFamily)
        );
        assert_eq!(
            parse_eprt_argument("|1|999.0.0.1|80|"),
            Err(EprtError::Malformed)
        );
        assert_eq!(parse_eprt_argument("1|10.0.0.1|80|"), Err(EprtError::Malformed));
        assert_eq!(parse_eprt_argument("|1|10.0.0.1|80"), Err(EprtError::Malformed));
        assert_eq!(parse_eprt_argument(""), Err(EprtError::Malformed));
    }

    #[test]
    fn eprt_argument_round_trips() {
        let addr: SocketAddr = "10.1.2.3:2021".parse().unwrap();
        assert_eq!(parse_eprt_argument(&format_eprt_argument(&addr)).unwrap(), addr);
    }
}
