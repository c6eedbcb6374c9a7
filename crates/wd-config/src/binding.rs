//! Host:port pair identifying one supervised service instance.

use std::fmt;

use serde::Deserialize;

const LOOPBACK_V4: &str = "127.0.0.1";
const LOOPBACK_V6: &str = "::1";
const WILDCARD_HOSTS: [&str; 2] = ["0.0.0.0", "::"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Binding {
    pub host: String,
    pub port: u16,
}

impl Binding {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, the form model-serving binaries expect in their host variable.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether the host listens on every interface.
    pub fn is_wildcard(&self) -> bool {
        WILDCARD_HOSTS.contains(&self.host.as_str())
    }

    /// Host to connect to when probing; wildcard listeners are reached via loopback.
    pub fn connect_host(&self) -> &str {
        match self.host.as_str() {
            "0.0.0.0" => LOOPBACK_V4,
            "::" => LOOPBACK_V6,
            host => host,
        }
    }

    /// HTTP URL for `path` on this binding.
    pub fn url(&self, path: &str) -> String {
        let host = self.connect_host();
        let path = path.trim_start_matches('/');

        if host.contains(':') {
            format!("http://[{host}]:{}/{path}", self.port)
        } else {
            format!("http://{host}:{}/{path}", self.port)
        }
    }

    /// Expands `{host}` and `{port}` in a command template.
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{host}", &self.host)
            .replace("{port}", &self.port.to_string())
    }

    /// Two bindings overlap when they would compete for the same listening socket.
    pub fn overlaps(&self, other: &Binding) -> bool {
        if self.port != other.port {
            return false;
        }

        self.host == other.host || self.is_wildcard() || other.is_wildcard()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
