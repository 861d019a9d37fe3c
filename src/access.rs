use log::{debug, warn};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::resolver::is_resolvable_uri;

/// Host allowlist for remote referents. With no list configured every host
/// is allowed.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_hosts: Option<Vec<String>>,
}

impl AccessPolicy {
    pub fn new(allowed_hosts: Option<Vec<String>>) -> Self {
        let allowed_hosts = allowed_hosts.map(|hosts| {
            hosts
                .into_iter()
                .map(|host| host.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect()
        });

        Self { allowed_hosts }
    }

    /// Returns the offending host when the referent points somewhere we
    /// don't fetch from.
    pub fn check(&self, referent: &str) -> Result<(), String> {
        let whitelist = match &self.allowed_hosts {
            Some(hosts) => hosts,
            None => return Ok(()),
        };

        let decoded = percent_decode_str(referent).decode_utf8_lossy();
        if !is_resolvable_uri(&decoded) {
            return Ok(());
        }

        // Unparseable URIs are rejected later by the resolver itself
        let host = match Url::parse(&decoded).ok().and_then(|url| url.host_str().map(str::to_ascii_lowercase)) {
            Some(host) => host,
            None => return Ok(()),
        };

        let allowed = whitelist
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)));

        if allowed {
            debug!("Host {} allowed", host);
            Ok(())
        } else {
            warn!("Host '{}' not in whitelist", host);
            Err(host)
        }
    }
}
