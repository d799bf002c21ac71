use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Client configuration. The nameserver is the single recursive server all
/// queries are sent to; its address family decides the socket's family.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    pub nameserver: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Worker threads for the client's runtime. 0 means one per core.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ResolverConfig {
    pub fn new(nameserver: IpAddr) -> Self {
        Self {
            nameserver,
            port: default_port(),
            workers: default_workers(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.nameserver, self.port)
    }

    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        }
    }
}

fn default_port() -> u16 {
    53
}

fn default_workers() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    500
}
