//! Sign and verify PDF documents from the command line.
//!
//! Usage:
//!   pdf-seal sign <input.pdf> <output.pdf> --key <key.hex> --author <name> [--subject <s>] [--id <id>]
//!   pdf-seal sign-text <input.txt> <output.pdf> --key <key.hex> --author <name> [--subject <s>] [--id <id>]
//!   pdf-seal verify <file.pdf> [--strict]
//!   pdf-seal inspect <file.pdf>
//!
//! The key file holds a 32-byte P-256 private key as hex. `verify` exits with
//! 0 on success, 1 for any other verification state and 2 when the file
//! cannot be read as a PDF.

use pdf_seal::config::{SaveMode, SealOptions};
use pdf_seal::document::HostDocument;
use pdf_seal::envelope::EnvelopeExtractor;
use pdf_seal::signatures::{
    DocumentSigner, KeyPair, SignRequest, SignerInfo, VerificationEngine, VerificationResult,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
Usage:
  pdf-seal sign <input.pdf> <output.pdf> --key <key.hex> --author <name> [--subject <s>] [--id <id>] [--full-rewrite]
  pdf-seal sign-text <input.txt> <output.pdf> --key <key.hex> --author <name> [--subject <s>] [--id <id>]
  pdf-seal verify <file.pdf> [--strict]
  pdf-seal inspect <file.pdf>";

enum Command {
    Sign { text: bool, input: PathBuf, output: PathBuf },
    Verify { input: PathBuf },
    Inspect { input: PathBuf },
}

struct CliConfig {
    command: Command,
    key: Option<PathBuf>,
    author: Option<String>,
    subject: Option<String>,
    id: Option<String>,
    strict: bool,
    full_rewrite: bool,
}

impl CliConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut positional = Vec::new();
        let mut key = None;
        let mut author = None;
        let mut subject = None;
        let mut id = None;
        let mut strict = false;
        let mut full_rewrite = false;

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--key" | "--author" | "--subject" | "--id" => {
                    i += 1;
                    let value = args.get(i).cloned().ok_or_else(|| format!("{} needs a value", flag))?;
                    match flag {
                        "--key" => key = Some(PathBuf::from(value)),
                        "--author" => author = Some(value),
                        "--subject" => subject = Some(value),
                        _ => id = Some(value),
                    }
                },
                "--strict" => strict = true,
                "--full-rewrite" => full_rewrite = true,
                "--help" | "-h" => return Err(String::new()),
                other if other.starts_with("--") => return Err(format!("unknown option {}", other)),
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        let name = positional.next().ok_or_else(String::new)?;
        let mut path = |what: &str| {
            positional
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} requires {}", name, what))
        };
        let command = match name.as_str() {
            "sign" | "sign-text" => Command::Sign {
                text: name == "sign-text",
                input: path("an input file")?,
                output: path("an output file")?,
            },
            "verify" => Command::Verify {
                input: path("a file")?,
            },
            "inspect" => Command::Inspect {
                input: path("a file")?,
            },
            other => return Err(format!("unknown command {}", other)),
        };

        Ok(Self {
            command,
            key,
            author,
            subject,
            id,
            strict,
            full_rewrite,
        })
    }

    fn options(&self) -> SealOptions {
        let options = if self.strict {
            SealOptions::strict()
        } else {
            SealOptions::default()
        };
        if self.full_rewrite {
            options.with_save_mode(SaveMode::FullRewrite)
        } else {
            options
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match CliConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}\n", message);
            }
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        },
    };

    let outcome = match &config.command {
        Command::Sign { text, input, output } => sign(&config, *text, input, output),
        Command::Verify { input } => verify(&config, input),
        Command::Inspect { input } => inspect(input),
    };
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        },
    }
}

fn sign(config: &CliConfig, text: bool, input: &PathBuf, output: &PathBuf) -> pdf_seal::Result<ExitCode> {
    let key_path = config
        .key
        .as_ref()
        .ok_or_else(|| pdf_seal::Error::Validation("--key is required".to_string()))?;
    let keys = KeyPair::from_private_hex(&fs::read_to_string(key_path)?)?;

    let mut request = SignRequest::new(config.author.clone().unwrap_or_default());
    if let Some(subject) = &config.subject {
        request = request.with_subject(subject);
    }
    if let Some(id) = &config.id {
        request = request.with_document_id(id);
    }

    let signer = DocumentSigner::new(config.options());
    let signed = if text {
        signer.sign_text(&fs::read_to_string(input)?, &keys, &request)?
    } else {
        signer.sign(&fs::read(input)?, &keys, &request)?
    };
    fs::write(output, &signed.bytes)?;

    println!("Signed {} -> {}", input.display(), output.display());
    if let Some(hash) = &signed.record.document_hash {
        println!("  document hash: {}", hash);
    }
    if let Some(id) = &signed.record.document_id {
        println!("  document id:   {}", id);
    }
    let accepted: Vec<&str> = signed.report.accepted.iter().map(|k| k.name()).collect();
    println!("  channels:      {}", accepted.join(", "));
    for (kind, reason) in &signed.report.failed {
        println!("  failed:        {} ({})", kind, reason);
    }
    Ok(ExitCode::SUCCESS)
}

fn verify(config: &CliConfig, input: &PathBuf) -> pdf_seal::Result<ExitCode> {
    let bytes = fs::read(input)?;
    let result = VerificationEngine::new(config.options()).verify(&bytes)?;

    println!("{}: {}", input.display(), result.state());
    if let Some(signer) = result.signer() {
        print_signer(signer);
    }
    match &result {
        VerificationResult::Success {
            document_hash,
            encoding,
            ..
        } => {
            println!("  document hash: {}", document_hash);
            println!("  encoding:      {}", encoding.name());
        },
        VerificationResult::ValidButModified {
            expected_hash,
            uploaded_hash,
            ..
        }
        | VerificationResult::InvalidSignature {
            expected_hash,
            uploaded_hash,
            ..
        } => {
            println!("  signed hash:   {}", expected_hash);
            println!("  current hash:  {}", uploaded_hash);
        },
        VerificationResult::MissingMetadata { uploaded_hash }
        | VerificationResult::MissingSignature { uploaded_hash, .. } => {
            println!("  current hash:  {}", uploaded_hash);
        },
        VerificationResult::Error { message } => println!("  error:         {}", message),
    }

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn inspect(input: &PathBuf) -> pdf_seal::Result<ExitCode> {
    let doc = HostDocument::from_bytes(fs::read(input)?)?;
    let (major, minor) = doc.version();
    println!("{}: PDF {}.{}", input.display(), major, minor);

    let extractor = EnvelopeExtractor::new(&SealOptions::default());
    for probe in extractor.probe(&doc) {
        let status = match (&probe.raw, probe.parsed) {
            (None, _) => "empty",
            (Some(_), true) => "envelope",
            (Some(_), false) => "unparseable",
        };
        println!("  {:<10} {}", probe.kind.name(), status);
    }

    match extractor.extract(&doc) {
        Some(found) => {
            println!("  recovered from {}", found.source);
            match found.record() {
                Ok(record) => {
                    print_signer(&SignerInfo::from_record(&record, found.source));
                    println!("  signed:        {}", record.has_signature());
                },
                Err(e) => println!("  undecodable:   {}", e),
            }
        },
        None => println!("  no envelope"),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_signer(signer: &SignerInfo) {
    if let Some(name) = &signer.name {
        println!("  signer:        {}", name);
    }
    if let Some(email) = &signer.email {
        println!("  email:         {}", email);
    }
    if let Some(subject) = &signer.subject {
        println!("  subject:       {}", subject);
    }
    if let Some(at) = &signer.signed_at {
        println!("  signed at:     {}", at.to_rfc3339());
    }
    if let Some(id) = &signer.document_id {
        println!("  document id:   {}", id);
    }
    println!("  source:        {}", signer.source);
}
