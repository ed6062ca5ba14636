pub mod error;
pub mod filter;
pub mod gateways;
pub mod todo;
pub mod user;
