mod asset;
mod client;
mod investment;
mod page;
mod user;

pub use asset::{Asset, AssetOption, AssetType};
pub use client::{Client, ClientOption, CreateClient, UpdateClient};
pub use investment::{
    AssetSummary, AssetTotal, ClientSummary, CreateInvestment, Investment, InvestmentDetail,
    InvestmentDetailRow, InvestmentStats, OwnerScope, UpdateInvestment,
};
pub use page::{Page, PageRequest};
pub use user::{NewUser, User};
