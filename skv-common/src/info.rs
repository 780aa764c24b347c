//! Introspection reply parsing.
//!
//! The server's INFO payload is a newline-delimited `key:value` listing.
//! Only `loading` (readiness gate) and `role` (primary validation) carry
//! meaning for the client; everything else passes through opaquely.

use std::collections::HashMap;

/// Parsed introspection payload.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    fields: HashMap<String, String>,
}

impl ServerInfo {
    /// Parses a raw INFO payload.
    ///
    /// Lines without a colon (section headers, blanks) are skipped. The
    /// value keeps any further colons intact.
    pub fn parse(payload: &[u8]) -> ServerInfo {
        let text = String::from_utf8_lossy(payload);
        let mut fields = HashMap::new();
        for line in text.lines() {
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.to_string(), value.to_string());
            }
        }
        ServerInfo { fields }
    }

    /// Looks up a field by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// True while the server reports it is still loading its dataset.
    /// The connection must not be considered ready until this clears.
    pub fn is_loading(&self) -> bool {
        matches!(self.get("loading"), Some(value) if value != "0")
    }

    /// Reported replication role, if any.
    pub fn role(&self) -> Option<&str> {
        self.get("role")
    }

    /// True when the node reports the primary role.
    pub fn is_primary(&self) -> bool {
        self.role() == Some("master")
    }
}
