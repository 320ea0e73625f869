//! Core types for rpc-interceptors.
//!
//! This crate provides the types shared by the interceptor client
//! (`rpc-interceptors-client`) and the transports it drives.
//!
//! ## Modules
//!
//! - `error`: RPC status codes and the [`Status`] type
//! - `metadata`: The [`Metadata`] header collection attached to calls
//! - `stream_item`: [`StreamItem`] and [`StreamItemCollection`] for resumable streams

mod error;
mod metadata;
mod stream_item;

pub use error::*;
pub use metadata::*;
pub use stream_item::{StreamItem, StreamItemCollection};
