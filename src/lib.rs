pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;
pub mod workflow;
