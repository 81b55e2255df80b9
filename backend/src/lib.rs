pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;
mod routes;
pub mod services;
pub mod state;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
