//! Property tests: write then extract, and sign then verify.

use pdf_seal::config::{SaveMode, SealOptions};
use pdf_seal::document::HostDocument;
use pdf_seal::envelope::{EnvelopeExtractor, EnvelopeWriter};
use pdf_seal::signatures::{
    CanonicalHasher, DocumentSigner, KeyPair, SignRequest, SignatureEngine, SigningRecord,
    VerificationEngine, FORMAT_VERSION,
};
use pdf_seal::writer::TextDocumentBuilder;
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = KeyPair> {
    prop::array::uniform32(1u8..=0x7f).prop_filter_map("valid scalar", |bytes| KeyPair::from_private(&bytes).ok())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_extract_returns_written_fields(
        text in "[ -~]{0,200}",
        author in "[A-Za-z][A-Za-z .'-]{0,40}",
        subject in proptest::option::of("[ -~]{1,60}"),
        keys in key_strategy(),
    ) {
        let original = TextDocumentBuilder::new(text).build();
        let digest = CanonicalHasher::digest(&original);
        let record = SigningRecord {
            signature: Some(SignatureEngine::sign(&digest, keys.private_key()).unwrap()),
            public_key: Some(keys.public_key().to_vec()),
            document_hash: Some(digest),
            signing_timestamp: None,
            author: Some(author.clone()),
            subject: subject.clone(),
            document_id: Some("prop".to_string()),
            format_version: FORMAT_VERSION.to_string(),
        };

        let written = EnvelopeWriter::new(SealOptions::default()).write(&original, &record).unwrap();
        prop_assert_ne!(CanonicalHasher::digest(&written.bytes), digest);

        let doc = HostDocument::from_bytes(written.bytes.as_slice()).unwrap();
        let found = EnvelopeExtractor::new(&SealOptions::strict()).extract(&doc).unwrap();
        let decoded = found.record().unwrap();
        prop_assert_eq!(decoded.signature, record.signature);
        prop_assert_eq!(decoded.public_key, record.public_key);
        prop_assert_eq!(decoded.document_hash, record.document_hash);
        prop_assert_eq!(decoded.author, record.author);
        prop_assert_eq!(decoded.subject, record.subject);
    }

    #[test]
    fn prop_signed_documents_verify(
        text in "[ -~\n]{0,200}",
        compress in any::<bool>(),
        full_rewrite in any::<bool>(),
        keys in key_strategy(),
    ) {
        let original = TextDocumentBuilder::new(text).compress(compress).build();
        let mode = if full_rewrite { SaveMode::FullRewrite } else { SaveMode::Incremental };
        let options = SealOptions::default().with_save_mode(mode);
        let signed = DocumentSigner::new(options.clone())
            .sign(&original, &keys, &SignRequest::new("Prop"))
            .unwrap();

        prop_assert_eq!(signed.record.document_hash, Some(CanonicalHasher::digest(&original)));
        prop_assert_ne!(CanonicalHasher::digest(&signed.bytes), CanonicalHasher::digest(&original));

        let result = VerificationEngine::new(options).verify(&signed.bytes).unwrap();
        if full_rewrite {
            // The pristine bytes are gone, so only the signature can be vouched for
            prop_assert_eq!(result.state().name(), "valid_but_modified");
        } else {
            prop_assert!(result.is_success(), "{:?}", result);
        }
    }

    #[test]
    fn prop_any_appended_bytes_are_detected(
        tail in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let original = TextDocumentBuilder::new("Hello World").build();
        let keys = KeyPair::from_private(&[0x11; 32]).unwrap();
        let mut bytes = DocumentSigner::new(SealOptions::default())
            .sign(&original, &keys, &SignRequest::new("Ada"))
            .unwrap()
            .bytes;
        bytes.extend_from_slice(&tail);

        let result = VerificationEngine::new(SealOptions::default()).verify(&bytes).unwrap();
        prop_assert!(!result.is_success(), "{:?}", result);
    }
}
