//! Metadata extraction from PDF documents.

pub mod xmp;

pub use xmp::{XmpExtractor, XmpMetadata};
