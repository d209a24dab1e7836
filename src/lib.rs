pub mod cli;
pub mod flows;
pub mod gate;
pub mod gateway;
pub mod routes;
pub mod session;
pub mod token;

/// User agent used for every outbound call to the identity provider.
pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
