//! Application server core
//!
//! HTTP request dispatch for a data application: static assets, a data API
//! with cloud functions and lifecycle triggers, custom routes and an SPA
//! fallback.

pub mod cloud;
pub mod cloud_code;
pub mod config;
pub mod gateway;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;
pub mod store;
