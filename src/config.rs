//! CLI argument parsing: `httpproxy <client-port> <server-port> [-u] [-c <N>] [-m <B>]`.

use crate::cache::Policy;
use crate::error::ProxyError;

pub const DEFAULT_CACHE_CAP: usize = 3;
pub const DEFAULT_MAX_FILE_SIZE: usize = 65536;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    pub client_port: u16,
    pub server_port: u16,
    pub policy: Policy,
    pub cache_cap: usize,
    pub max_file_size: usize,
}

impl ProxyConfig {
    /// Parses an argv-style iterator (flags and positionals may
    /// interleave in any order; the two positionals are taken in order
    /// of appearance).
    pub fn parse<I, S>(args: I) -> Result<Self, ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Policy::Fifo;
        let mut cache_cap: i64 = DEFAULT_CACHE_CAP as i64;
        let mut max_file_size: i64 = DEFAULT_MAX_FILE_SIZE as i64;
        let mut client_port: Option<u16> = None;
        let mut server_port: Option<u16> = None;

        let mut it = args.into_iter();
        while let Some(arg) = it.next() {
            match arg.as_ref() {
                "-u" => policy = Policy::Lru,
                "-c" => {
                    let value = it.next().ok_or(ProxyError::CliUsage)?;
                    let n: i64 = value.as_ref().parse().map_err(|_| ProxyError::CliUsage)?;
                    if n < 0 {
                        return Err(ProxyError::CliUsage);
                    }
                    cache_cap = n;
                }
                "-m" => {
                    let value = it.next().ok_or(ProxyError::CliUsage)?;
                    let n: i64 = value.as_ref().parse().map_err(|_| ProxyError::CliUsage)?;
                    if n <= 0 {
                        return Err(ProxyError::CliUsage);
                    }
                    max_file_size = n;
                }
                positional => {
                    let port: u16 = positional.parse().map_err(|_| ProxyError::CliUsage)?;
                    if port == 0 {
                        return Err(ProxyError::CliUsage);
                    }
                    if client_port.is_none() {
                        client_port = Some(port);
                    } else if server_port.is_none() {
                        server_port = Some(port);
                    } else {
                        return Err(ProxyError::CliUsage);
                    }
                }
            }
        }

        let (client_port, server_port) = match (client_port, server_port) {
            (Some(c), Some(s)) => (c, s),
            _ => return Err(ProxyError::CliUsage),
        };

        Ok(Self {
            client_port,
            server_port,
            policy,
            cache_cap: cache_cap as usize,
            max_file_size: max_file_size as usize,
        })
    }
}
