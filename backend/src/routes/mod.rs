pub(crate) mod auth;
pub(crate) mod clients;
pub(crate) mod form;
pub(crate) mod health;
pub(crate) mod investments;
