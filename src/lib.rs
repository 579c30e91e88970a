pub mod api;
pub mod authorization; // Row policies
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod dashboard;
pub mod db;
pub mod events; // Change feed
pub mod identity;
pub mod lookup;
pub mod models;
pub mod storage;
pub mod store; // Policy-guarded data access
pub mod timeline;
pub mod validation;
