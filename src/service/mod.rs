//! # Service Layer
//!
//! Async drivers that run sessions over real byte streams.

pub mod connection;

pub use connection::Connection;
