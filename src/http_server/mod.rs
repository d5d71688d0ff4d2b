//! # HTTP Server Module
//!
//! Form-driven CRUD endpoints over the record engine. Handlers only map
//! requests onto engine calls; every response body is JSON.
//!
//! # Endpoints
//!
//! - `/` - Table list
//! - `/view/:table` - All rows of a table
//! - `/add/:table` - Column description (GET) and insert (POST)
//! - `/delete/:table/:column/:value` - Delete matching rows
//! - `/update/:table/:column/:value` - Current row (GET) and update (POST)
//! - `/query_plants` - Plants ordered by a customer

pub mod config;
pub mod routes;
pub mod server;

pub use config::HttpServerConfig;
pub use routes::{crud_routes, CrudState};
pub use server::HttpServer;
