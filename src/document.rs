//! In-memory PDF document.
//!
//! [`HostDocument`] parses a byte buffer into its object graph, lets callers
//! edit dictionaries and add objects, and remembers what changed so the
//! writer can append just those objects as an incremental update.
//!
//! # Example
//!
//! ```
//! use pdf_seal::document::HostDocument;
//! use pdf_seal::writer::TextDocumentBuilder;
//!
//! let bytes = TextDocumentBuilder::new("Hello World").build();
//! let doc = HostDocument::from_bytes(bytes)?;
//! assert_eq!(doc.version(), (1, 7));
//! assert!(doc.catalog().is_ok());
//! # Ok::<(), pdf_seal::error::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object;
use crate::xref::{find_xref_offset, parse_xref_chain, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Maximum reference hops followed by [`HostDocument::resolve`].
const MAX_RESOLVE_DEPTH: usize = 32;

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

static NULL: Object = Object::Null;

/// A parsed PDF document that can be edited and saved.
#[derive(Clone)]
pub struct HostDocument {
    /// The bytes the document was parsed from
    source: Vec<u8>,
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Trailer dictionary (merged across the `/Prev` chain)
    trailer: Dict,
    /// Every loaded object, keyed by object number
    objects: BTreeMap<u32, (u16, Object)>,
    /// Objects added or changed since loading
    modified: BTreeSet<u32>,
    /// Offset of the last cross-reference section, if the chain was sound
    startxref: Option<usize>,
    /// Next free object number
    next_id: u32,
}

impl std::fmt::Debug for HostDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostDocument")
            .field("version", &self.version)
            .field("objects", &self.objects.len())
            .field("modified", &self.modified.len())
            .field("startxref", &self.startxref)
            .finish()
    }
}

impl HostDocument {
    /// Parse a document from bytes.
    ///
    /// A broken or missing cross-reference chain is repaired by scanning the
    /// file; such documents can only be saved by full rewrite.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidHeader` if there is no `%PDF-` marker
    /// - `Error::InvalidPdf` if no objects or no catalog can be found
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        let source = data.into();
        let version = parse_header(&source)?;

        let (xref, startxref) = match open_regular(&source) {
            Ok((xref, offset)) => (xref, Some(offset)),
            Err(e) => {
                log::warn!("Regular xref parsing failed: {}, attempting reconstruction", e);
                match reconstruct_xref(&source) {
                    Ok(xref) => (xref, None),
                    Err(recon_err) => {
                        log::error!("Xref reconstruction also failed: {}", recon_err);
                        return Err(e);
                    },
                }
            },
        };

        let mut doc = Self {
            source,
            version,
            trailer: Dict::new(),
            objects: BTreeMap::new(),
            modified: BTreeSet::new(),
            startxref,
            next_id: 1,
        };

        let failures = doc.load_objects(xref)?;
        if failures > 0 && doc.startxref.is_some() {
            log::warn!("{} objects could not be loaded through the xref, rescanning", failures);
            let rebuilt = reconstruct_xref(&doc.source)?;
            doc.startxref = None;
            doc.load_objects(rebuilt)?;
        }

        if doc.catalog_ref().is_err() {
            return Err(Error::InvalidPdf("no document catalog (/Root) found".to_string()));
        }
        if doc.trailer.contains_key("Encrypt") {
            log::warn!("Document is encrypted; strings are read without decryption");
        }

        log::debug!("Loaded {:?}", doc);
        Ok(doc)
    }

    /// Load every object named by `xref`; returns how many in-use entries failed.
    ///
    /// Objects already present (from an earlier pass) are kept.
    fn load_objects(&mut self, mut xref: CrossRefTable) -> Result<usize> {
        let trailer = xref.take_trailer().unwrap_or_default();
        for (key, value) in trailer {
            self.trailer.entry(key).or_insert(value);
        }

        let mut failures = 0;
        let mut compressed: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        let lengths = |r: ObjectRef| resolve_length(&self.source, &xref, r);
        let mut loaded = Vec::new();

        for (id, entry) in xref.iter() {
            match entry {
                XRefEntry::Free => {},
                XRefEntry::InUse { offset, gen } => {
                    if self.objects.contains_key(&id) {
                        continue;
                    }
                    match load_at(&self.source, offset, &lengths) {
                        Ok((reference, obj)) if reference.id == id => loaded.push((id, gen, obj)),
                        Ok((reference, _)) => {
                            log::warn!("Xref entry {} points at object {}", id, reference);
                            failures += 1;
                        },
                        Err(e) => {
                            log::warn!("Failed to load object {} at offset {}: {}", id, offset, e);
                            failures += 1;
                        },
                    }
                },
                XRefEntry::Compressed { stream, .. } => compressed.entry(stream).or_default().push(id),
            }
        }

        for (id, gen, obj) in loaded {
            self.objects.insert(id, (gen, obj));
        }

        for (stream_id, members) in compressed {
            let unpacked = match self.objects.get(&stream_id) {
                Some((_, stream)) => parse_object_stream(stream),
                None => Err(Error::ObjectNotFound(stream_id, 0)),
            };
            let mut unpacked: HashMap<u32, Object> = match unpacked {
                Ok(objects) => objects,
                Err(e) => {
                    log::warn!("Failed to unpack object stream {}: {}", stream_id, e);
                    failures += members.len();
                    continue;
                },
            };
            for id in members {
                if self.objects.contains_key(&id) {
                    continue;
                }
                match unpacked.remove(&id) {
                    Some(obj) => {
                        self.objects.insert(id, (0, obj));
                    },
                    None => {
                        log::warn!("Object {} missing from object stream {}", id, stream_id);
                        failures += 1;
                    },
                }
            }
        }

        let size = self.trailer.get("Size").and_then(Object::as_integer).unwrap_or(0).max(0) as u32;
        let highest = self.objects.keys().next_back().copied().unwrap_or(0);
        self.next_id = self.next_id.max(size).max(highest.saturating_add(1)).max(1);
        Ok(failures)
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The bytes the document was parsed from.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Offset of the last cross-reference section when the chain was usable.
    ///
    /// `None` means the xref was reconstructed and an incremental update
    /// cannot point back at it.
    pub fn startxref(&self) -> Option<usize> {
        self.startxref
    }

    /// Next object number that [`add_object`](Self::add_object) will assign.
    pub fn next_object_id(&self) -> u32 {
        self.next_id
    }

    /// Get an object by reference. Generation mismatches are tolerated.
    pub fn get(&self, reference: ObjectRef) -> Option<&Object> {
        self.objects.get(&reference.id).map(|(_, obj)| obj)
    }

    /// Follow references until a direct object is reached.
    ///
    /// Dangling or cyclic references resolve to `null`.
    pub fn resolve<'a>(&'a self, mut obj: &'a Object) -> &'a Object {
        for _ in 0..MAX_RESOLVE_DEPTH {
            match obj {
                Object::Reference(r) => match self.get(*r) {
                    Some(target) => obj = target,
                    None => return &NULL,
                },
                direct => return direct,
            }
        }
        log::warn!("Reference chain deeper than {}, treating as null", MAX_RESOLVE_DEPTH);
        &NULL
    }

    /// Look up `key` in `dict` and resolve the value.
    pub fn resolve_key<'a>(&'a self, dict: &'a Dict, key: &str) -> Option<&'a Object> {
        dict.get(key).map(|v| self.resolve(v)).filter(|v| !v.is_null())
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        let reference = self
            .trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))?;
        match self.get(reference) {
            Some(Object::Dictionary(_)) => Ok(reference),
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
            None => Err(Error::ObjectNotFound(reference.id, reference.gen)),
        }
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<&Dict> {
        let reference = self.catalog_ref()?;
        self.get(reference)
            .and_then(Object::as_dict)
            .ok_or(Error::ObjectNotFound(reference.id, reference.gen))
    }

    /// The document information dictionary, direct or indirect.
    pub fn info(&self) -> Option<&Dict> {
        self.resolve_key(&self.trailer, "Info").and_then(Object::as_dict)
    }

    /// Make sure `/Info` is an indirect dictionary and return its reference.
    ///
    /// A direct `/Info` in the trailer is moved into a new object; a missing
    /// one is created empty.
    pub fn ensure_info(&mut self) -> ObjectRef {
        if let Some(reference) = self.trailer.get("Info").and_then(Object::as_reference) {
            if matches!(self.get(reference), Some(Object::Dictionary(_))) {
                return reference;
            }
        }
        let existing = match self.trailer.get("Info") {
            Some(Object::Dictionary(d)) => d.clone(),
            _ => Dict::new(),
        };
        let reference = self.add_object(Object::Dictionary(existing));
        self.trailer.insert("Info".to_string(), Object::Reference(reference));
        reference
    }

    /// Mutable access to an indirect dictionary; marks it modified.
    pub fn dict_mut(&mut self, reference: ObjectRef) -> Result<&mut Dict> {
        let (_, obj) = self
            .objects
            .get_mut(&reference.id)
            .ok_or(Error::ObjectNotFound(reference.id, reference.gen))?;
        let found = obj.type_name();
        let dict = obj.as_dict_mut().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: found.to_string(),
        })?;
        self.modified.insert(reference.id);
        Ok(dict)
    }

    /// Replace an object (or define a new one at a chosen number).
    pub fn set_object(&mut self, reference: ObjectRef, obj: Object) {
        self.objects.insert(reference.id, (reference.gen, obj));
        self.modified.insert(reference.id);
        self.next_id = self.next_id.max(reference.id.saturating_add(1));
    }

    /// Add a new object and return its reference.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let reference = ObjectRef::new(self.next_id, 0);
        self.set_object(reference, obj);
        reference
    }

    /// Every object in object-number order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.objects
            .iter()
            .map(|(&id, (gen, obj))| (ObjectRef::new(id, *gen), obj))
    }

    /// Objects added or changed since loading, in object-number order.
    pub fn modified_objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.modified.iter().filter_map(|id| {
            self.objects
                .get(id)
                .map(|(gen, obj)| (ObjectRef::new(*id, *gen), obj))
        })
    }

    /// Whether anything has changed since loading.
    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }
}

/// Locate the `%PDF-M.m` header and return the version.
///
/// # Errors
///
/// Returns `Error::InvalidHeader` when the marker is absent from the start of
/// the file.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let pos = window.windows(5).position(|w| w == b"%PDF-").ok_or_else(|| {
        let found: String = String::from_utf8_lossy(&data[..data.len().min(8)])
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        Error::InvalidHeader(found)
    })?;
    if pos > 0 {
        log::warn!("PDF header found at offset {} instead of 0", pos);
    }

    let version = &data[pos + 5..];
    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => Ok((major - b'0', minor - b'0')),
        _ => {
            log::warn!("Unreadable PDF version after header, assuming 1.4");
            Ok((1, 4))
        },
    }
}

fn open_regular(data: &[u8]) -> Result<(CrossRefTable, usize)> {
    let offset = find_xref_offset(data)?;
    let xref = parse_xref_chain(data, offset)?;
    if xref.is_empty() || xref.trailer().is_none() {
        return Err(Error::InvalidXref);
    }
    Ok((xref, offset))
}

fn load_at(data: &[u8], offset: usize, lengths: &dyn Fn(ObjectRef) -> Option<usize>) -> Result<(ObjectRef, Object)> {
    let input = data.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: "offset beyond end of file".to_string(),
    })?;
    let (_, indirect) = parse_indirect_object(input, Some(lengths)).map_err(|e| match e {
        Error::ParseError { reason, .. } => Error::ParseError { offset, reason },
        other => other,
    })?;
    Ok((indirect.reference, indirect.object))
}

/// Resolve an indirect stream `/Length` without loading the whole document.
fn resolve_length(data: &[u8], xref: &CrossRefTable, reference: ObjectRef) -> Option<usize> {
    match xref.get(reference.id)? {
        XRefEntry::InUse { offset, .. } => {
            let (_, indirect) = parse_indirect_object(data.get(*offset..)?, None).ok()?;
            indirect.object.as_integer().filter(|&n| n >= 0).map(|n| n as usize)
        },
        _ => None,
    }
}
