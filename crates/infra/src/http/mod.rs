//! HTTP implementations of the outbound payment transport

pub mod client;

pub use client::{HttpTransport, HttpTransportBuilder};
