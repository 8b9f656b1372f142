//! External service integrations

pub mod woo;

pub use woo::WooClient;
