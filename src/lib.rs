// Library exports for BabyVision
// This allows integration tests and external code to use the server modules

pub mod activity;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod profile;
pub mod routes;
pub mod state;
pub mod voucher;
