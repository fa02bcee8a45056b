pub mod actions;
pub mod checkin;
pub mod context;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod guard;
pub mod helpers;
pub mod state;
pub mod store;
pub mod types;
pub mod workflow;
