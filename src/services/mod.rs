pub mod auth;
pub mod ledger;
pub mod locks;
pub mod seed;
