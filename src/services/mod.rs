pub mod client;
pub mod controller;
pub mod filter;
pub mod memo;
pub mod merger;
pub mod notify;
pub mod reconcile;
pub mod stats;
pub mod table;
pub mod view_state;
