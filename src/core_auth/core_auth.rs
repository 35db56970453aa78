use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use log::warn;

use crate::core_auth::helper::verify_password;

#[derive(Debug, Clone)]
pub struct PasswdEntry {
    username: String,
    hashed_password: String,
}

impl PasswdEntry {
    pub fn from_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            return None;
        }
        let entry = PasswdEntry {
            username: parts[0].to_string(),
            hashed_password: parts[1].to_string(),
        };

        Some(entry)
    }

    pub fn get_hashed_password(&self) -> &str {
        &self.hashed_password
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }
}

/// The authentication oracle for the server. Loaded once at startup and
/// shared read-only across all sessions.
#[derive(Debug)]
pub struct AuthStore {
    users: HashMap<String, PasswdEntry>,
}

impl AuthStore {
    pub fn empty() -> Self {
        AuthStore {
            users: HashMap::new(),
        }
    }

    /// Parse `user:bcrypt-hash` lines; blank lines and `#` comments are
    /// skipped, anything else malformed is logged and ignored.
    pub fn from_lines(content: &str) -> Self {
        let mut users = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match PasswdEntry::from_line(line) {
                Some(entry) => {
                    users.insert(entry.get_username().to_string(), entry);
                }
                None => warn!("Skipping malformed passwd line"),
            }
        }
        AuthStore { users }
    }

    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read passwd file: {}", path))?;
        Ok(Self::from_lines(&content))
    }

    pub fn user_exists(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn check_password(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(entry) => verify_password(password, entry.get_hashed_password()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_auth::helper::hash_password;

    #[test]
    fn rejects_malformed_lines() {
        assert!(PasswdEntry::from_line("no-separator").is_none());
        assert!(PasswdEntry::from_line("too:many:fields").is_none());
    }

    #[test]
    fn lookup_and_password_check() {
        let hash = hash_password("hunter2");
        let store = AuthStore::from_lines(&format!("# comment\n\nalice:{}\n", hash));

        assert!(store.user_exists("alice"));
        assert!(!store.user_exists("bob"));
        assert!(store.check_password("alice", "hunter2"));
        assert!(!store.check_password("alice", "wrong"));
        assert!(!store.check_password("bob", "hunter2"));
    }
}
