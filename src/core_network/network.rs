use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::core_auth::AuthStore;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::initialize_command_handlers;
use crate::core_ftpcommand::utils::send_reply;
use crate::core_proto::{read_command, CommandRead, ProtoError, SockBuf};
use crate::session::Session;
use crate::Config;

pub async fn start_server(config: Arc<Config>, auth_store: Arc<AuthStore>) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.server.listen_port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.server.listen_port))?;
    info!("Server listening on port {}", config.server.listen_port);

    let base_path = PathBuf::from(&config.server.chroot_dir)
        .canonicalize()
        .with_context(|| format!("Cannot resolve served root {:?}", config.server.chroot_dir))?;

    let mut next_conn_id: u64 = 0;
    loop {
        let (socket, addr) = listener.accept().await?;
        next_conn_id += 1;
        let conn_id = next_conn_id;
        info!("Conn {}: new connection from {}", conn_id, addr);

        let config = Arc::clone(&config);
        let auth_store = Arc::clone(&auth_store);
        let base_path = base_path.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(conn_id, socket, config, base_path, auth_store).await
            {
                error!("Conn {}: connection error: {:?}", conn_id, e);
            }
            info!("Conn {}: connection closed", conn_id);
        });
    }
}

/// Runs one control connection to completion: greet, then alternate
/// strictly between reading a command and sending its replies. Command
/// parsing problems are answered and survived; I/O problems on the
/// control connection end the session.
pub async fn handle_connection(
    conn_id: u64,
    socket: TcpStream,
    config: Arc<Config>,
    base_path: PathBuf,
    auth_store: Arc<AuthStore>,
) -> Result<()> {
    let (mut reader, writer) = socket.into_split();
    let writer = Arc::new(Mutex::new(writer));
    let session = Arc::new(Mutex::new(Session::new(conn_id, base_path, auth_store)));
    let handlers = initialize_command_handlers();
    let mut sockbuf = SockBuf::new();

    send_reply(&writer, 220, "Service ready for new user.").await?;

    loop {
        match read_command(&mut sockbuf, &mut reader).await {
            Ok(CommandRead::Cmd(cmd)) => {
                info!("Conn {}: received {:?}", conn_id, cmd.verb);
                if cmd.verb == FtpCommand::QUIT && !cmd.arg.is_empty() {
                    // QUIT takes no arguments.
                    send_reply(&writer, 501, "Syntax error in parameters or arguments.").await?;
                    continue;
                }
                if cmd.verb == FtpCommand::ACCT {
                    send_reply(&writer, 202, "Command not implemented, superfluous at this site.")
                        .await?;
                    continue;
                }
                let quitting = cmd.verb == FtpCommand::QUIT;
                match handlers.get(&cmd.verb) {
                    Some(handler) => {
                        (**handler)(
                            Arc::clone(&writer),
                            Arc::clone(&config),
                            Arc::clone(&session),
                            cmd.arg,
                        )
                        .await?
                    }
                    None => send_reply(&writer, 502, "Command not implemented.").await?,
                }
                if quitting {
                    break;
                }
            }
            Ok(CommandRead::Unknown(verb)) => {
                warn!("Conn {}: unsupported command {:?}", conn_id, verb);
                send_reply(&writer, 502, "Command not implemented.").await?;
            }
            Ok(CommandRead::Superfluous) => {
                send_reply(&writer, 202, "Command not implemented, superfluous at this site.")
                    .await?;
            }
            Ok(CommandRead::SyntaxError) => {
                warn!("Conn {}: invalid command or argument too long", conn_id);
                send_reply(&writer, 500, "Syntax error, command unrecognized.").await?;
            }
            Err(ProtoError::Closed) => {
                info!("Conn {}: connection closed by client", conn_id);
                break;
            }
            Err(e) => {
                error!("Conn {}: control channel failure: {}", conn_id, e);
                return Err(e.into());
            }
        }
    }

    // Don't leak a still-listening accept task past the session.
    session.lock().await.clear_data_channel();
    Ok(())
}
