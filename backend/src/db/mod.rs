pub mod asset_queries;
pub mod client_queries;
pub mod investment_queries;
pub mod repository;
pub mod user_queries;

pub use repository::{
    AssetRepository, ClientRepository, InvestmentRepository, PgStore, UserRepository,
};
