//! Envelope writing.

use super::channels::channel_for;
use super::EmbeddingChannel;
use crate::config::{ChannelKind, SealOptions};
use crate::document::HostDocument;
use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::signatures::{CanonicalHasher, SigningRecord};
use chrono::{DateTime, Utc};

/// Per-channel outcome of a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Channels that hold the envelope
    pub accepted: Vec<ChannelKind>,
    /// Channels that failed, with the reason
    pub failed: Vec<(ChannelKind, String)>,
}

impl WriteReport {
    /// Whether every attempted channel accepted the envelope.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Output of [`EnvelopeWriter::write`].
#[derive(Debug, Clone)]
pub struct WrittenDocument {
    /// The new document bytes
    pub bytes: Vec<u8>,
    /// Channel outcomes
    pub report: WriteReport,
}

/// Writes a signing record into a document across the configured channels.
pub struct EnvelopeWriter {
    options: SealOptions,
    channels: Vec<Box<dyn EmbeddingChannel>>,
}

impl EnvelopeWriter {
    /// Writer for the channels configured in `options`.
    pub fn new(options: SealOptions) -> Self {
        let channels = options.channels.iter().map(|&kind| channel_for(kind)).collect();
        Self { options, channels }
    }

    /// Writer over explicit channel implementations.
    pub fn with_channels(options: SealOptions, channels: Vec<Box<dyn EmbeddingChannel>>) -> Self {
        Self { options, channels }
    }

    /// Embed `record` into a copy of `original`.
    ///
    /// `record.document_hash` must be the digest of `original` (it is filled
    /// in when absent). The caller's bytes are never modified.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for an inconsistent record or oversized input
    /// - structural errors if `original` is not a readable PDF
    /// - `Error::NoChannelAccepted` if every channel failed
    pub fn write(&self, original: &[u8], record: &SigningRecord) -> Result<WrittenDocument> {
        self.options.check_size(original.len())?;
        if record.signature.is_some() != record.public_key.is_some() {
            return Err(Error::Validation(
                "signature and public key must be given together".to_string(),
            ));
        }

        let pristine = CanonicalHasher::digest(original);
        let mut record = record.clone();
        match record.document_hash {
            Some(hash) if hash != pristine => {
                return Err(Error::Validation(format!(
                    "document hash {} is not the digest of the original bytes ({})",
                    hash, pristine
                )));
            },
            Some(_) => {},
            None => record.document_hash = Some(pristine),
        }

        let mut doc = HostDocument::from_bytes(original)?;
        let blob = record.to_json()?;

        let mut report = WriteReport::default();
        for channel in &self.channels {
            let kind = channel.kind();
            match channel.write(&mut doc, &blob) {
                Ok(()) => {
                    log::debug!("Channel {}: envelope written", kind);
                    report.accepted.push(kind);
                },
                Err(e) => {
                    log::warn!("Channel {}: write failed: {}", kind, e);
                    report.failed.push((kind, e.to_string()));
                },
            }
        }
        if report.accepted.is_empty() {
            return Err(Error::NoChannelAccepted);
        }

        self.set_descriptive_fields(&mut doc, &record)?;

        let bytes = crate::writer::save(&doc, self.options.save_mode)?;
        log::info!(
            "Envelope written to {} channel(s), {} -> {} bytes",
            report.accepted.len(),
            original.len(),
            bytes.len()
        );
        Ok(WrittenDocument { bytes, report })
    }

    /// Human-readable Info entries, independent of the envelope.
    fn set_descriptive_fields(&self, doc: &mut HostDocument, record: &SigningRecord) -> Result<()> {
        let when = record.signing_timestamp.unwrap_or_else(Utc::now);
        let info = doc.ensure_info();
        let dict: &mut Dict = doc.dict_mut(info)?;

        if let Some(subject) = record.subject.as_deref().filter(|s| !s.trim().is_empty()) {
            if !dict.contains_key("Title") {
                dict.insert("Title".to_string(), Object::text(subject));
            }
            dict.insert("Subject".to_string(), Object::text(subject));
        }
        if let Some(author) = record.author.as_deref().filter(|s| !s.trim().is_empty()) {
            dict.insert("Author".to_string(), Object::text(author));
        }
        dict.insert("Producer".to_string(), Object::text(&self.options.producer));
        dict.insert("ModDate".to_string(), Object::text(&pdf_date(&when)));
        if !dict.contains_key("CreationDate") {
            dict.insert("CreationDate".to_string(), Object::text(&pdf_date(&when)));
        }
        Ok(())
    }
}

/// Format a PDF date string (ISO 32000-1:2008, Section 7.9.4).
pub fn pdf_date(when: &DateTime<Utc>) -> String {
    format!("D:{}+00'00'", when.format("%Y%m%d%H%M%S"))
}
