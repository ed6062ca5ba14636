pub mod graphql_gateway;
pub mod identity;
pub mod local_store;
pub mod notifier;
pub mod sqlite_gateway;
