use std::sync::Arc;

use log::{error, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::constants::TRANSFER_BUF_SIZE;
use crate::core_ftpcommand::utils::{resolve_path, send_reply};
use crate::core_network::open_data_connection;
use crate::session::Session;
use crate::Config;

/// Handles the RETR (Retrieve) FTP command.
///
/// Streams a file from the served tree to the client over the negotiated
/// data connection. The path is resolved through the sandbox so the file
/// can never come from outside the served root.
///
/// # Arguments
///
/// * `writer` - A shared, locked write half for sending replies.
/// * `_config` - A shared server configuration (not used in this command).
/// * `session` - A shared, locked session containing the user's current state.
/// * `arg` - The name of the file to retrieve.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_retr_command(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    _config: Arc<Config>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let (conn_id, file_path) = {
        let session = session.lock().await;
        if !session.is_authenticated {
            return send_reply(&writer, 530, "Must be authenticated to run this command.").await;
        }
        if !session.dtp_ready {
            return send_reply(
                &writer,
                450,
                "Specify a data transfer control command first (i.e. PORT, PASV, EPRT, EPSV).",
            )
            .await;
        }
        if arg.is_empty() {
            return send_reply(&writer, 501, "Syntax error in parameters or arguments.").await;
        }
        match resolve_path(&session.base_path, &session.current_dir, &arg) {
            Ok(path) if path.is_file() => (session.id, path),
            _ => {
                warn!("Conn {}: RETR with illegal path {:?}", session.id, arg);
                return send_reply(&writer, 550, "File not found.").await;
            }
        }
    };

    let mut file = match File::open(&file_path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Conn {}: could not open {:?}: {}", conn_id, file_path, e);
            return send_reply(&writer, 550, "File not found.").await;
        }
    };

    send_reply(&writer, 150, "Opening data connection.").await?;

    let mut data_stream = match open_data_connection(&session).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Conn {}: no data connection for RETR: {}", conn_id, e);
            return send_reply(&writer, 425, "Can't open data connection.").await;
        }
    };

    let mut buffer = vec![0u8; TRANSFER_BUF_SIZE];
    loop {
        let bytes_read = match file.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Conn {}: error reading {:?}: {}", conn_id, file_path, e);
                return send_reply(
                    &writer,
                    451,
                    "Requested action aborted: local error in processing.",
                )
                .await;
            }
        };
        if let Err(e) = data_stream.write_all(&buffer[..bytes_read]).await {
            error!("Conn {}: error sending file to client: {}", conn_id, e);
            return send_reply(
                &writer,
                451,
                "Requested action aborted: local error in processing.",
            )
            .await;
        }
    }
    drop(data_stream);

    info!("Conn {}: file sent: {:?}", conn_id, file_path);
    send_reply(&writer, 226, "Transfer complete.").await
}
