//! Serper (Google search) provider

pub mod client;
pub mod types;

pub use client::{SerperClient, PROVIDER_NAME};
