//! Cookie jar persisted between runs so the harvester can skip a full login.
use crate::error::SocialError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Cookies that must be present for a session to be usable.
pub const SESSION_COOKIES: [&str; 2] = ["auth_token", "ct0"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl SessionToken {
    /// Read and check a token file. A file that parses but lacks the session
    /// cookies is treated as corrupt.
    pub fn load(path: &Path) -> Result<Self, SocialError> {
        let bytes = std::fs::read(path)
            .map_err(|e| SocialError::Token(format!("read {}: {e}", path.display())))?;
        let token: SessionToken = serde_json::from_slice(&bytes)
            .map_err(|e| SocialError::Token(format!("parse {}: {e}", path.display())))?;
        if !token.is_authenticated() {
            return Err(SocialError::Token(format!(
                "{} lacks session cookies {:?}",
                path.display(),
                SESSION_COOKIES
            )));
        }
        Ok(token)
    }

    /// Write the token, creating parent directories. On unix the file is
    /// readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<(), SocialError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SocialError::Token(format!("create {}: {e}", parent.display())))?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| SocialError::Token(format!("serialize: {e}")))?;
        std::fs::write(path, bytes)
            .map_err(|e| SocialError::Token(format!("write {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| SocialError::Token(format!("chmod {}: {e}", path.display())))?;
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        SESSION_COOKIES
            .iter()
            .all(|name| self.cookies.get(*name).is_some_and(|v| !v.is_empty()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Apply `Set-Cookie` pairs; an empty value deletes the cookie.
    pub fn merge<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in pairs {
            if value.is_empty() {
                self.cookies.remove(&name);
            } else {
                self.cookies.insert(name, value);
            }
        }
    }

    /// `Cookie` request header value.
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
