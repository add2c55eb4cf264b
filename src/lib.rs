//! Decoder, encoder and ordered store for Java-style `.properties` text.
//! Parsing never touches I/O; the [`loader`] module provides the seam for fetching text
//! from files (plain or gzip) or caller-supplied sources, synchronously or on tokio.

pub mod decode;
pub mod encode;
pub mod loader;
pub mod statics;
mod store;

pub use decode::{Entries, LexError, decode};
pub use encode::{EncodeOptions, LineEnding, encode};
pub use loader::{
    FileLoader, LoadError, PropertiesOptions, ResourceLoader, ResourceRequest, properties,
    properties_async,
};
pub use store::PropertyStore;
