// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! `Credential`: a typed, hostname-pattern-scoped secret used by the
//! mirror scheduler to authenticate against remote Git hosts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CredentialType {
    Password { username: String, password: String },
    SshKey { username: String, private_key: String, passphrase: Option<String> },
    AccessToken { token: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub credential_type: CredentialType,
    pub enabled: bool,
    pub hostname_patterns: Vec<String>,
}

impl Credential {
    /// Whether this credential's hostname pattern list matches `host`.
    /// An empty pattern list never matches any host (P6).
    pub fn matches_host(&self, host: &str) -> bool {
        if !self.enabled || self.hostname_patterns.is_empty() {
            return false;
        }
        self.hostname_patterns.iter().any(|p| glob_match_host(p, host))
    }
}

/// Simple hostname glob: `*` matches any run of characters within the
/// host string (no path segments involved, so a plain wildcard suffices).
fn glob_match_host(pattern: &str, host: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return host.ends_with(suffix);
    }
    pattern == host
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_list_matches_nothing() {
        let c = Credential {
            id: "c1".into(),
            credential_type: CredentialType::None,
            enabled: true,
            hostname_patterns: vec![],
        };
        assert!(!c.matches_host("example.com"));
    }

    #[test]
    fn wildcard_suffix_matches() {
        let c = Credential {
            id: "c1".into(),
            credential_type: CredentialType::None,
            enabled: true,
            hostname_patterns: vec!["*.example.com".into()],
        };
        assert!(c.matches_host("git.example.com"));
        assert!(!c.matches_host("example.org"));
    }
}
