// API module
//
// This module contains the HTTP adapter for the ledger service

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use routes::configure_routes;
