//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! HostDocument (objects + modified set)
//!     ↓
//! [save] incremental update or full rewrite
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```
//!
//! [`TextDocumentBuilder`] produces a deterministic one-page document from
//! plain text, and [`XmpWriter`] the XMP packets stored in `/Metadata`.

mod object_serializer;
mod pdf_writer;
mod text_document;
mod xmp_metadata;

pub use object_serializer::ObjectSerializer;
pub use pdf_writer::{assemble, save, write_full, write_incremental};
pub use text_document::TextDocumentBuilder;
pub use xmp_metadata::{iso_timestamp, XmpWriter, NS_PDFSEAL, PDFSEAL_PREFIX};
