use std::sync::Arc;

use log::{error, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::constants::TRANSFER_BUF_SIZE;
use crate::core_ftpcommand::utils::{resolve_parent_for_create, send_reply};
use crate::core_network::open_data_connection;
use crate::session::Session;
use crate::Config;

/// Handles the STOR (Store File) FTP command.
///
/// Receives file data from the client over the negotiated data connection
/// and writes it inside the served tree. The target's parent directory is
/// resolved through the sandbox; the file itself may be new.
///
/// # Arguments
///
/// * `writer` - A shared, locked write half for sending replies.
/// * `_config` - A shared server configuration (not used in this command).
/// * `session` - A shared, locked session containing the user's current state.
/// * `arg` - The name of the file to store.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_stor_command(
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
        match resolve_parent_for_create(&session.base_path, &session.current_dir, &arg) {
            Ok(path) => (session.id, path),
            Err(e) => {
                warn!("Conn {}: STOR with illegal path {:?}: {}", session.id, arg, e);
                return send_reply(&writer, 550, "Illegal path.").await;
            }
        }
    };

    let mut file = match File::create(&file_path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Conn {}: could not create {:?}: {}", conn_id, file_path, e);
            return send_reply(&writer, 550, "Could not create file.").await;
        }
    };

    send_reply(&writer, 150, "Ok to send data.").await?;

    let mut data_stream = match open_data_connection(&session).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Conn {}: no data connection for STOR: {}", conn_id, e);
            return send_reply(&writer, 425, "Can't open data connection.").await;
        }
    };

    let mut buffer = vec![0u8; TRANSFER_BUF_SIZE];
    loop {
        let bytes_read = match data_stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Conn {}: error receiving file data: {}", conn_id, e);
                return send_reply(
                    &writer,
                    451,
                    "Requested action aborted: local error in processing.",
                )
                .await;
            }
        };
        if let Err(e) = file.write_all(&buffer[..bytes_read]).await {
            error!("Conn {}: error writing {:?}: {}", conn_id, file_path, e);
            return send_reply(
                &writer,
                451,
                "Requested action aborted: local error in processing.",
            )
            .await;
        }
    }
    if let Err(e) = file.flush().await {
        error!("Conn {}: error flushing {:?}: {}", conn_id, file_path, e);
        return send_reply(
            &writer,
            451,
            "Requested action aborted: local error in processing.",
        )
        .await;
    }
    drop(data_stream);

    info!("Conn {}: file stored: {:?}", conn_id, file_path);
    send_reply(&writer, 226, "Transfer complete.").await
}
