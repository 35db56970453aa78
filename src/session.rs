use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::core_auth::AuthStore;

/// The data-channel selection made by the most recent PORT/EPRT/PASV/EPSV
/// command. An inbound selection owns the background task that is blocked
/// in accept on the advertised listener.
#[derive(Debug)]
pub enum DataChannel {
    Idle,
    /// Peer address from PORT/EPRT; dialed when the transfer starts.
    Outbound(SocketAddr),
    /// Background accept task from PASV/EPSV; joined when the transfer
    /// starts.
    Inbound(JoinHandle<io::Result<TcpStream>>),
}

/// Per-connection server state, owned by the connection's task. Created
/// on accept, dropped on QUIT or connection error.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub username: Option<String>,
    pub is_authenticated: bool,
    /// Display path shown to the client, always `/`-rooted with a
    /// trailing `/`. Distinct from the canonical filesystem path.
    pub current_dir: String,
    /// Canonical sandbox root; client paths never resolve outside it.
    pub base_path: PathBuf,
    pub data_channel: DataChannel,
    pub passive: bool,
    pub extended: bool,
    /// A data-channel mode has been selected and not yet consumed.
    pub dtp_ready: bool,
    /// Set by EPSV ALL; PORT/PASV/EPRT stay rejected for the rest of the
    /// session.
    pub epsv_only: bool,
    pub auth_store: Arc<AuthStore>,
}

impl Session {
    pub fn new(id: u64, base_path: PathBuf, auth_store: Arc<AuthStore>) -> Self {
        Session {
            id,
            username: None,
            is_authenticated: false,
            current_dir: String::from("/"),
            base_path,
            data_channel: DataChannel::Idle,
            passive: false,
            extended: false,
            dtp_ready: false,
            epsv_only: false,
            auth_store,
        }
    }

    /// USER always restarts the login sequence. Returns the reply code to
    /// send: 331 when the name is known, 530 otherwise.
    pub fn user_submitted(&mut self, username: &str, known: bool) -> u16 {
        self.is_authenticated = false;
        if known {
            self.username = Some(username.to_string());
            331
        } else {
            self.username = None;
            530
        }
    }

    /// PASS outcome: 503 when no USER preceded it, 230 on success, 530 on
    /// a wrong password (which also forgets the username).
    pub fn pass_submitted(&mut self, password_ok: bool) -> u16 {
        if self.username.is_none() {
            self.is_authenticated = false;
            return 503;
        }
        if password_ok {
            self.is_authenticated = true;
            230
        } else {
            self.is_authenticated = false;
            self.username = None;
            530
        }
    }

    /// Select an active-mode target, superseding any pending selection.
    pub fn set_outbound(&mut self, addr: SocketAddr, extended: bool) {
        self.clear_data_channel();
        self.data_channel = DataChannel::Outbound(addr);
        self.passive = false;
        self.extended = extended;
        self.dtp_ready = true;
    }

    /// Select a passive-mode listener, superseding any pending selection.
    pub fn set_inbound(&mut self, accept_task: JoinHandle<io::Result<TcpStream>>, extended: bool) {
        self.clear_data_channel();
        self.data_channel = DataChannel::Inbound(accept_task);
        self.passive = true;
        self.extended = extended;
        self.dtp_ready = true;
    }

    /// Consume the pending selection for a transfer.
    pub fn take_data_channel(&mut self) -> DataChannel {
        self.dtp_ready = false;
        std::mem::replace(&mut self.data_channel, DataChannel::Idle)
    }

    /// Drop any pending selection, cancelling a still-listening accept
    /// task so its listener closes.
    pub fn clear_data_channel(&mut self) {
        if let DataChannel::Inbound(task) = &self.data_channel {
            debug!("Conn {}: cancelling pending data-channel listener", self.id);
            task.abort();
        }
        self.data_channel = DataChannel::Idle;
        self.dtp_ready = false;
    }

    /// EPSV ALL: pin the session to extended passive mode. Also
    /// invalidates whatever selection was pending, so the next transfer
    /// needs a fresh EPSV.
    pub fn mark_epsv_only(&mut self) {
        self.clear_data_channel();
        self.epsv_only = true;
        self.passive = true;
        self.extended = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.clear_data_channel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn new_session() -> Session {
        Session::new(1, PathBuf::from("/tmp"), Arc::new(AuthStore::empty()))
    }

    fn some_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 2021)
    }

    #[test]
    fn unknown_user_stays_unauthenticated() {
        let mut session = new_session();
        assert_eq!(session.user_submitted("nobody", false), 530);
        assert!(!session.is_authenticated);
        assert_eq!(session.username, None);
    }

    #[test]
    fn known_user_then_correct_password_authenticates() {
        let mut session = new_session();
        assert_eq!(session.user_submitted("alice", true), 331);
        assert!(!session.is_authenticated);
        assert_eq!(session.pass_submitted(true), 230);
        assert!(session.is_authenticated);
    }

    #[test]
    fn wrong_password_clears_the_username() {
        let mut session = new_session();
        assert_eq!(session.user_submitted("alice", true), 331);
        assert_eq!(session.pass_submitted(false), 530);
        assert!(!session.is_authenticated);
        assert_eq!(session.username, None);
    }

    #[test]
    fn pass_without_user_is_a_sequencing_error() {
        let mut session = new_session();
        assert_eq!(session.pass_submitted(true), 503);
        assert!(!session.is_authenticated);
    }

    #[test]
    fn user_resets_a_previous_login() {
        let mut session = new_session();
        session.user_submitted("alice", true);
        session.pass_submitted(true);
        assert!(session.is_authenticated);
        assert_eq!(session.user_submitted("bob", true), 331);
        assert!(!session.is_authenticated);
    }

    #[test]
    fn outbound_selection_sets_mode_flags() {
        let mut session = new_session();
        session.set_outbound(some_addr(), false);
        assert!(session.dtp_ready);
        assert!(!session.passive);
        assert!(!session.extended);
        match session.take_data_channel() {
            DataChannel::Outbound(addr) => assert_eq!(addr, some_addr()),
            other => panic!("expected Outbound, got {:?}", other),
        }
        assert!(!session.dtp_ready);
    }

    #[tokio::test]
    async fn epsv_all_invalidates_a_pending_selection() {
        let mut session = new_session();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            Ok(stream)
        });
        session.set_inbound(task, false);
        assert!(session.dtp_ready);

        session.mark_epsv_only();
        assert!(session.epsv_only);
        assert!(!session.dtp_ready);
        assert!(matches!(session.data_channel, DataChannel::Idle));
    }

    #[tokio::test]
    async fn superseding_a_listener_cancels_its_accept_task() {
        let mut session = new_session();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            Ok(stream)
        });
        session.set_inbound(task, false);
        session.set_outbound(some_addr(), false);
        match session.take_data_channel() {
            DataChannel::Outbound(_) => {}
            other => panic!("expected Outbound, got {:?}", other),
        }
    }
}
