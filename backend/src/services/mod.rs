pub mod asset_service;
pub mod auth_service;
pub mod client_service;
pub mod investment_service;
