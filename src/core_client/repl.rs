use std::io::Write as _;
use std::path::Path;

use anyhow::Result;
use log::warn;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

use super::data::{self, TransferCtx};
use super::ftp::ClientPi;
use crate::core_proto::ProtoError;

/// The interactive command loop of the client. Reads one command per
/// line, drives the matching request/reply exchange and prints what the
/// server said.
pub struct Repl {
    pi: ClientPi,
    ctx: TransferCtx,
    stdin: BufReader<Stdin>,
}

/// Runs the REPL to completion. A server that goes away (421 or EOF on
/// the control connection) ends the session normally, not as an error.
pub async fn run(pi: ClientPi) -> Result<()> {
    let mut repl = Repl {
        pi,
        ctx: TransferCtx::default(),
        stdin: BufReader::new(tokio::io::stdin()),
    };
    match repl.drive().await {
        Ok(()) => Ok(()),
        Err(ProtoError::Closed) => {
            println!("Connection closed by server");
            Ok(())
        }
        Err(ProtoError::ServiceUnavailable) => {
            println!("Server not available or is shutting down");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

impl Repl {
    async fn drive(&mut self) -> Result<(), ProtoError> {
        self.wait_for_server().await?;
        if !self.login().await? {
            return self.goodbye().await;
        }
        loop {
            let Some(input) = self.prompt("> ").await? else {
                return self.goodbye().await;
            };
            let mut words = input.split_whitespace();
            let Some(command) = words.next() else {
                continue;
            };
            match command {
                "quit" => {
                    // Reply is either 221 or 500; we are quitting anyway.
                    let _ = self.pi.quit().await;
                    return Ok(());
                }
                "help" => self.do_help(words.next()).await?,
                "pwd" => self.do_pwd().await?,
                "system" => self.do_system().await?,
                "cd" => self.do_cd(words.next()).await?,
                "ls" => self.do_ls(words.next()).await?,
                "get" => self.do_get(words.next(), words.next()).await?,
                "put" => self.do_put(words.next(), words.next()).await?,
                "passive" => {
                    self.ctx.passive = !self.ctx.passive;
                    println!(
                        "PASV before data transfers: {}",
                        if self.ctx.passive { "enabled" } else { "disabled" }
                    );
                }
                "extended" => {
                    self.ctx.extended = !self.ctx.extended;
                    println!(
                        "Extended addressing (EPRT/EPSV): {}",
                        if self.ctx.extended { "enabled" } else { "disabled" }
                    );
                }
                _ => println!("Unknown command"),
            }
        }
    }

    /// Read one line of user input; `None` is end-of-file on stdin.
    async fn prompt(&mut self, text: &str) -> Result<Option<String>, ProtoError> {
        print!("{}", text);
        std::io::stdout().flush()?;
        let mut line = String::new();
        let n = self.stdin.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    /// Stdin is gone: say goodbye to the server before terminating.
    async fn goodbye(&mut self) -> Result<(), ProtoError> {
        println!("stdin closed. Goodbye");
        let _ = self.pi.quit().await;
        Ok(())
    }

    async fn wait_for_server(&mut self) -> Result<(), ProtoError> {
        loop {
            let reply = self.pi.wait_for_reply().await?;
            if reply.code == 220 {
                break;
            }
        }
        println!("Server is ready");
        Ok(())
    }

    /// Prompt for credentials until the server accepts them. `Ok(false)`
    /// means stdin closed mid-login.
    async fn login(&mut self) -> Result<bool, ProtoError> {
        loop {
            let Some(username) = self.prompt("Username: ").await? else {
                return Ok(false);
            };
            let reply = self.pi.user(&username).await?;
            if reply.is_completion() {
                println!("Username OK");
                return Ok(true);
            }
            if reply.is_intermediate() {
                println!("Username OK");
                let Some(password) = self.prompt("Password: ").await? else {
                    return Ok(false);
                };
                let reply = self.pi.pass(&password).await?;
                if reply.is_completion() {
                    println!("Password OK");
                    return Ok(true);
                }
                if reply.is_intermediate() {
                    // We don't support ACCT as per requirements
                    println!("ACCT not supported by this client. Cannot complete auth");
                    return Ok(false);
                }
            }
            println!("Invalid login credentials");
        }
    }

    async fn do_help(&mut self, topic: Option<&str>) -> Result<(), ProtoError> {
        let reply = self.pi.help(topic).await?;
        if reply.is_completion() {
            println!("{}", reply.text);
        } else if reply.code == 500 || reply.code == 501 {
            println!("Syntax error; check your command");
        } else if reply.code == 502 {
            println!("Command not recognized by the server");
        } else {
            println!("Error executing command. See log");
        }
        Ok(())
    }

    async fn do_pwd(&mut self) -> Result<(), ProtoError> {
        let reply = self.pi.pwd().await?;
        if reply.is_completion() {
            println!("{}", reply.text);
        } else {
            println!("Error executing command. See log");
        }
        Ok(())
    }

    async fn do_system(&mut self) -> Result<(), ProtoError> {
        let reply = self.pi.syst().await?;
        if reply.is_completion() {
            println!("{}", reply.text);
        } else {
            println!("Error executing command. See log");
        }
        Ok(())
    }

    async fn do_cd(&mut self, path: Option<&str>) -> Result<(), ProtoError> {
        let Some(path) = path else {
            println!("A path must be specified");
            return Ok(());
        };
        let reply = self.pi.cwd(path).await?;
        if !reply.is_completion() {
            println!("Failed to change working directory. See log");
        }
        Ok(())
    }

    async fn do_ls(&mut self, path: Option<&str>) -> Result<(), ProtoError> {
        let Some(conn) = data::establish(&mut self.pi, &self.ctx).await? else {
            return Ok(());
        };
        let reply = self.pi.list(path).await?;
        if !reply.is_preliminary() {
            println!("Error executing command. See log");
            return Ok(());
        }
        println!("{}", reply.text);
        match conn.into_stream().await {
            Ok(mut stream) => {
                let mut stdout = tokio::io::stdout();
                if let Err(e) = tokio::io::copy(&mut stream, &mut stdout).await {
                    warn!("Error while reading from server-DTP: {}", e);
                }
                let _ = stdout.flush().await;
            }
            Err(e) => warn!("Failed to open the data connection: {}", e),
        }
        let done = self.pi.wait_for_reply().await?;
        println!("{}", done.text);
        Ok(())
    }

    async fn do_get(&mut self, remote: Option<&str>, local: Option<&str>) -> Result<(), ProtoError> {
        let Some(remote) = remote else {
            println!("A remote file must be specified");
            return Ok(());
        };
        let local = match local {
            Some(local) => local.to_string(),
            None => Path::new(remote)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| remote.to_string()),
        };

        let Some(conn) = data::establish(&mut self.pi, &self.ctx).await? else {
            return Ok(());
        };
        let reply = self.pi.retr(remote).await?;
        if !reply.is_preliminary() {
            println!("Failed to retrieve file: {}", reply.text);
            return Ok(());
        }
        println!("{}", reply.text);
        match conn.into_stream().await {
            Ok(mut stream) => match tokio::fs::File::create(&local).await {
                Ok(mut file) => {
                    if let Err(e) = tokio::io::copy(&mut stream, &mut file).await {
                        warn!("Error while saving {}: {}", local, e);
                        println!("Transfer failed. See log");
                    } else {
                        println!("Saved to {}", local);
                    }
                }
                Err(e) => {
                    warn!("Cannot create {}: {}", local, e);
                    println!("Cannot create the local file");
                }
            },
            Err(e) => warn!("Failed to open the data connection: {}", e),
        }
        let done = self.pi.wait_for_reply().await?;
        println!("{}", done.text);
        Ok(())
    }

    async fn do_put(&mut self, local: Option<&str>, remote: Option<&str>) -> Result<(), ProtoError> {
        let Some(local) = local else {
            println!("A local file must be specified");
            return Ok(());
        };
        let remote = match remote {
            Some(remote) => remote.to_string(),
            None => Path::new(local)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| local.to_string()),
        };
        let mut file = match tokio::fs::File::open(local).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot open {}: {}", local, e);
                println!("Cannot open the local file");
                return Ok(());
            }
        };

        let Some(conn) = data::establish(&mut self.pi, &self.ctx).await? else {
            return Ok(());
        };
        let reply = self.pi.stor(&remote).await?;
        if !reply.is_preliminary() {
            println!("Failed to store file: {}", reply.text);
            return Ok(());
        }
        println!("{}", reply.text);
        match conn.into_stream().await {
            Ok(mut stream) => {
                if let Err(e) = tokio::io::copy(&mut file, &mut stream).await {
                    warn!("Error while sending {}: {}", local, e);
                    println!("Transfer failed. See log");
                }
                // Dropping the stream here signals end-of-file to the server.
            }
            Err(e) => warn!("Failed to open the data connection: {}", e),
        }
        let done = self.pi.wait_for_reply().await?;
        println!("{}", done.text);
        Ok(())
    }
}
