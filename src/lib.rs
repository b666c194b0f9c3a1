// Library exports for Guidepost
// Integration tests drive the router through these modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod guides;
pub mod legacy;
pub mod reactions;
pub mod routes;
pub mod state;
