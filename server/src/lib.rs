pub mod cookies;
pub mod encryption;
pub mod errors;
pub mod gatekeeper;
pub mod oauth;
pub mod routes;
pub mod session;
pub mod state;
