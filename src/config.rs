use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// CLI flags. Left unset, `Config::parse` falls back to `PROXY_HOST`/
/// `PROXY_PORT` and then to the hardcoded defaults; clap's own `env`
/// attribute isn't used here because it treats a *set-but-empty* env var
/// as a literal value rather than "absent", and the external contract
/// requires an empty env var to fall back like an unset one.
#[derive(Parser, Debug, Clone)]
#[command(name = "rangeproxy", about = "Forwarding HTTP/1.x proxy with client-driven byte-range splicing")]
struct Cli {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

/// Listener configuration, sourced from `PROXY_HOST`/`PROXY_PORT`
/// environment variables, with equivalent CLI flags for local runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn parse() -> anyhow::Result<Config> {
        let cli = Cli::parse();
        let host = resolve_host(cli.host, std::env::var("PROXY_HOST").ok());
        let port = resolve_port(cli.port, std::env::var("PROXY_PORT").ok())?;
        Ok(Config { host, port })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().with_context(|| format!("invalid PROXY_HOST value {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// CLI wins if given; otherwise a non-empty env var; otherwise the default.
/// An env var present but set to `""` is treated the same as unset.
fn resolve_host(cli: Option<String>, env: Option<String>) -> String {
    cli.or_else(|| env.filter(|v| !v.is_empty())).unwrap_or_else(|| DEFAULT_HOST.to_string())
}

fn resolve_port(cli: Option<u16>, env: Option<String>) -> anyhow::Result<u16> {
    if let Some(port) = cli {
        return Ok(port);
    }
    match env.filter(|v| !v.is_empty()) {
        Some(v) => v.parse::<u16>().with_context(|| format!("invalid PROXY_PORT value {v:?}")),
        None => Ok(DEFAULT_PORT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_cli_and_env_both_absent() {
        assert_eq!(resolve_host(None, None), "0.0.0.0");
        assert_eq!(resolve_port(None, None).unwrap(), 8000);
    }

    #[test]
    fn empty_env_var_is_treated_as_absent() {
        assert_eq!(resolve_host(None, Some(String::new())), "0.0.0.0");
        assert_eq!(resolve_port(None, Some(String::new())).unwrap(), 8000);
    }

    #[test]
    fn non_empty_env_var_is_used() {
        assert_eq!(resolve_host(None, Some("10.0.0.1".to_string())), "10.0.0.1");
        assert_eq!(resolve_port(None, Some("9001".to_string())).unwrap(), 9001);
    }

    #[test]
    fn cli_flag_overrides_env() {
        assert_eq!(resolve_host(Some("192.168.1.1".to_string()), Some("10.0.0.1".to_string())), "192.168.1.1");
        assert_eq!(resolve_port(Some(9100), Some("9001".to_string())).unwrap(), 9100);
    }

    #[test]
    fn unparseable_port_env_var_is_an_error() {
        assert!(resolve_port(None, Some("not-a-port".to_string())).is_err());
    }

    #[test]
    fn listen_addr_combines_host_and_port() {
        let cfg = Config { host: "127.0.0.1".to_string(), port: 9001 };
        assert_eq!(cfg.listen_addr().unwrap(), "127.0.0.1:9001".parse().unwrap());
    }

    #[test]
    fn rejects_unparseable_host() {
        let cfg = Config { host: "not-an-ip".to_string(), port: 8000 };
        assert!(cfg.listen_addr().is_err());
    }
}
