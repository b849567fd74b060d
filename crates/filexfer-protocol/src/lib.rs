//! Wire codec, framed transport, chunker, and crypto primitives for the
//! secure file-transfer protocol. No filesystem or CLI concerns live here;
//! see `filexfer-client` for the session driver that ties this into a
//! runnable program.

pub mod chunk;
pub mod crypto;
pub mod error;
pub mod transport;
pub mod wire;

pub use error::{ProtocolError, Result};
