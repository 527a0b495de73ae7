use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::chain::RpcClient;
use crate::config::Config;
use crate::ipfs::Pinner;
use crate::mirror::Mirror;
use crate::store::Store;

/// Application shared state. Everything in here is immutable or
/// internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub mirror: Mirror,
    pub tokens: Arc<TokenIssuer>,
    pub pinner: Arc<Pinner>,
    pub chain: Arc<RpcClient>,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        let pinner = match &config.ipfs_api_url {
            Some(url) => Pinner::kubo(url, &config.ipfs_gateway),
            None => Pinner::embedded(store.clone()),
        };
        Self {
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret, config.jwt_expire_hours)),
            chain: Arc::new(RpcClient::new(config.rpc_url())),
            mirror: Mirror::new(store.clone()),
            pinner: Arc::new(pinner),
            store,
            config: Arc::new(config),
        }
    }
}
