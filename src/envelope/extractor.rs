//! Cascading envelope extraction.

use super::channels::channel_for;
use super::normalize::{has_field_marker, parse_envelope};
use super::EmbeddingChannel;
use crate::config::{ChannelKind, SealOptions};
use crate::document::HostDocument;
use crate::error::Result;
use crate::object::{decode_text_string, Object};
use crate::signatures::{EnvelopeWire, RecordSource, SigningRecord};

/// Nesting depth followed while collecting strings for the scan.
const MAX_SCAN_DEPTH: usize = 32;

/// An envelope recovered from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEnvelope {
    /// Where it was found
    pub source: RecordSource,
    /// Parsed wire fields
    pub wire: EnvelopeWire,
}

impl ExtractedEnvelope {
    /// Decode the binary fields into a [`SigningRecord`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if a field holds neither hex nor base64.
    pub fn record(&self) -> Result<SigningRecord> {
        SigningRecord::from_wire(&self.wire)
    }
}

/// What one channel holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProbe {
    /// The channel
    pub kind: ChannelKind,
    /// Raw text found, if any
    pub raw: Option<String>,
    /// Whether the text parsed into an envelope
    pub parsed: bool,
}

/// Probes channels in priority order and returns the first usable envelope.
pub struct EnvelopeExtractor {
    channels: Vec<Box<dyn EmbeddingChannel>>,
    scan_fallback: bool,
}

impl EnvelopeExtractor {
    /// Extractor reading the channels configured in `options`.
    pub fn new(options: &SealOptions) -> Self {
        Self {
            channels: options.channels.iter().map(|&kind| channel_for(kind)).collect(),
            scan_fallback: options.scan_fallback,
        }
    }

    /// Extractor over explicit channel implementations.
    pub fn with_channels(channels: Vec<Box<dyn EmbeddingChannel>>, scan_fallback: bool) -> Self {
        Self {
            channels,
            scan_fallback,
        }
    }

    /// Parse `bytes` and extract.
    ///
    /// # Errors
    ///
    /// Only structural errors from parsing the document are returned.
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<Option<ExtractedEnvelope>> {
        let doc = HostDocument::from_bytes(bytes)?;
        Ok(self.extract(&doc))
    }

    /// Find the envelope in `doc`. Absence is `None`, never an error.
    pub fn extract(&self, doc: &HostDocument) -> Option<ExtractedEnvelope> {
        for channel in &self.channels {
            let kind = channel.kind();
            let Some(raw) = channel.read(doc) else {
                log::debug!("Channel {}: empty", kind);
                continue;
            };
            match parse_envelope(&raw) {
                Some(wire) => {
                    log::debug!("Channel {}: envelope found", kind);
                    return Some(ExtractedEnvelope {
                        source: RecordSource::Channel(kind),
                        wire,
                    });
                },
                None => log::warn!("Channel {}: {} bytes of unparseable content", kind, raw.len()),
            }
        }

        if self.scan_fallback {
            if let Some(wire) = scan(doc) {
                log::info!("Envelope recovered by scanning document strings");
                return Some(ExtractedEnvelope {
                    source: RecordSource::Scan,
                    wire,
                });
            }
        }
        None
    }

    /// Report what every configured channel holds.
    pub fn probe(&self, doc: &HostDocument) -> Vec<ChannelProbe> {
        self.channels
            .iter()
            .map(|channel| {
                let raw = channel.read(doc);
                let parsed = raw.as_deref().and_then(parse_envelope).is_some();
                ChannelProbe {
                    kind: channel.kind(),
                    raw,
                    parsed,
                }
            })
            .collect()
    }
}

/// Last resort: every string in the document, including decoded streams.
fn scan(doc: &HostDocument) -> Option<EnvelopeWire> {
    let mut texts = Vec::new();
    for (_, obj) in doc.objects() {
        collect_strings(obj, 0, &mut texts);
    }
    for value in doc.trailer().values() {
        collect_strings(value, 0, &mut texts);
    }
    texts
        .iter()
        .filter(|text| has_field_marker(text))
        .find_map(|text| parse_envelope(text))
}

fn collect_strings(obj: &Object, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    match obj {
        Object::String(bytes) => out.push(decode_text_string(bytes)),
        Object::Array(items) => {
            for item in items {
                collect_strings(item, depth + 1, out);
            }
        },
        Object::Dictionary(dict) => {
            for value in dict.values() {
                collect_strings(value, depth + 1, out);
            }
        },
        Object::Stream { dict, .. } => {
            if matches!(dict.get("Type").and_then(Object::as_name), Some("XRef" | "ObjStm")) {
                return;
            }
            for value in dict.values() {
                collect_strings(value, depth + 1, out);
            }
            match obj.decode_stream_data() {
                Ok(data) => out.push(String::from_utf8_lossy(&data).into_owned()),
                Err(e) => log::debug!("Scan skipped undecodable stream: {}", e),
            }
        },
        _ => {},
    }
}
