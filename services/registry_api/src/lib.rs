//! Off-chain half of the land registry: a REST mirror of the ledger with
//! search, document pinning and wallet sign-in.

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod geo;
pub mod ipfs;
pub mod mirror;
pub mod model;
pub mod query;
pub mod state;
pub mod store;

pub use api::router;
pub use config::Config;
pub use error::ApiError;
pub use state::AppState;
pub use store::Store;
