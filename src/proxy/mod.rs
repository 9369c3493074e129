// src/proxy/mod.rs
// Proxy front-end: routes chat requests to upstream LLM backends with
// memory enrichment on the way through

mod backend;
mod filter;
mod routes;
mod server;

pub use backend::{ApiType, Backend, BackendConfig, InboundRoute, ProxyConfig};
pub use filter::should_skip;
pub use server::{ProxyServer, last_user_text};
