//! HTTP edge: the authorization gate in front of every route, plus the
//! login, session and tenant endpoints.

pub mod app;
pub mod config;
pub mod context;
pub mod cookie;
pub mod middleware;
