use std::fs;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_port: u16,
    /// Directory served to clients; every client-visible path lives under
    /// it.
    pub chroot_dir: String,
    /// Public IP address advertised in PASV replies.
    pub pasv_address: String,
    /// Path to the `user:bcrypt-hash` password file.
    pub passwd_file: String,
    /// Allow active-mode transfers (PORT/EPRT).
    #[serde(default = "default_true")]
    pub port_mode: bool,
    /// Allow passive-mode transfers (PASV/EPSV).
    #[serde(default = "default_true")]
    pub pasv_mode: bool,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
}

fn default_true() -> bool {
    true
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;
    let config: Config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse configuration file: {}", path))?;
    if !config.server.port_mode && !config.server.pasv_mode {
        bail!("At least one of port_mode or pasv_mode must be enabled");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[server]
listen_port = 2121
chroot_dir = "/srv/ftp"
pasv_address = "198.51.100.7"
passwd_file = "/etc/ftpd_passwd"
"#;

    #[test]
    fn transfer_modes_default_to_enabled() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert!(config.server.port_mode);
        assert!(config.server.pasv_mode);
        assert_eq!(config.server.listen_port, 2121);
    }

    #[test]
    fn disabling_both_modes_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", MINIMAL).unwrap();
        writeln!(file, "port_mode = false\npasv_mode = false").unwrap();
        assert!(load_config(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn one_disabled_mode_is_fine() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", MINIMAL).unwrap();
        writeln!(file, "port_mode = false").unwrap();
        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert!(!config.server.port_mode);
        assert!(config.server.pasv_mode);
    }
}
