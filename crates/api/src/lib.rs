//! HTTP dispatcher: routes requests through the authorization engine and maps
//! its decisions to responses.

pub mod app;
pub mod context;
pub mod middleware;
pub mod settings;
