//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Stellar network the registry contract is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://soroban-testnet.stellar.org",
            Network::Mainnet => "https://mainnet.sorobanrpc.com",
        }
    }

    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Testnet => "Test SDF Network ; September 2015",
            Network::Mainnet => "Public Global Stellar Network ; September 2015",
        }
    }
}

/// Land registry REST service.
#[derive(Parser, Debug, Clone)]
#[command(name = "registry-api", version, about = "Land registry REST service")]
pub struct Config {
    /// Listen address.
    #[arg(long, env = "REGISTRY_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Directory holding the embedded database.
    #[arg(long, env = "REGISTRY_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "STELLAR_NETWORK", value_enum, default_value = "testnet")]
    pub network: Network,

    /// Soroban RPC endpoint. Defaults to the public endpoint of `network`.
    #[arg(long, env = "STELLAR_RPC_URL")]
    pub rpc_url: Option<String>,

    #[arg(long, env = "LAND_REGISTRY_CONTRACT_ID")]
    pub contract_id: Option<String>,

    /// IPFS HTTP API (kubo). Without it documents are pinned into the
    /// local database.
    #[arg(long, env = "IPFS_API_URL")]
    pub ipfs_api_url: Option<String>,

    #[arg(long, env = "IPFS_GATEWAY", default_value = "https://ipfs.io")]
    pub ipfs_gateway: String,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "JWT_EXPIRE_HOURS", default_value_t = 24)]
    pub jwt_expire_hours: i64,

    /// Comma-separated allowed origins; `*` allows any.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Upload limit in bytes.
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = 10 * 1024 * 1024)]
    pub max_file_size: usize,
}

impl Config {
    pub fn rpc_url(&self) -> &str {
        self.rpc_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_rpc_url())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("registry.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_with_defaults() {
        let cfg = Config::try_parse_from(["registry-api", "--jwt-secret", "s3cret"]).unwrap();
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.rpc_url(), "https://soroban-testnet.stellar.org");
        assert_eq!(cfg.max_file_size, 10 * 1024 * 1024);
        assert_eq!(cfg.jwt_expire_hours, 24);
        assert!(cfg.db_path().ends_with("registry.redb"));
    }

    #[test]
    fn explicit_rpc_url_wins() {
        let cfg = Config::try_parse_from([
            "registry-api",
            "--jwt-secret",
            "x",
            "--network",
            "mainnet",
            "--rpc-url",
            "http://localhost:8000/rpc",
            "--cors-origins",
            "http://a.test,http://b.test",
        ])
        .unwrap();
        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.rpc_url(), "http://localhost:8000/rpc");
        assert_eq!(cfg.cors_origins, vec!["http://a.test", "http://b.test"]);
    }
}
