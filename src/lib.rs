pub mod config;
pub mod datasource;
pub mod fetch;
pub mod message;
pub mod model;
pub mod poller;
pub mod registry;
pub mod server;
pub mod session;
