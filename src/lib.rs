// Library exports for Morphx
// This allows integration tests and external code to use Morphx modules

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod flash;
pub mod media;
pub mod moderation;
pub mod routes;
pub mod state;
