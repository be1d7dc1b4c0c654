//! Infrastructure layer: sockets, REST client and wire formats.

pub mod dto;
pub mod rest;
pub mod websocket;

pub use rest::{HttpSupportApi, SupportApi};
pub use websocket::{ConnectionManager, ConnectionOptions};
