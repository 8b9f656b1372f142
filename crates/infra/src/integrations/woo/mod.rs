//! WooCommerce upstream integration

pub mod client;

pub use client::WooClient;
