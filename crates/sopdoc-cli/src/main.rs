//! sopdoc command line.
//!
//! Builds, validates and renders block-based SOP documents stored in SQLite.
//!
//! Usage:
//!   sopdoc create lab-safety "Laboratory Safety Procedures" --kind sop
//!   sopdoc add lab-safety title "Laboratory Safety Procedures"
//!   sopdoc add lab-safety step '{"description": "Check equipment", "instructions": "...", "ppe_required": true}'
//!   sopdoc show lab-safety
//!   sopdoc render lab-safety --format html --toc > lab-safety.html
//!   sopdoc demo
//!
//! Documents are referenced by key, full id, or a unique key / id prefix.
//! Blocks are referenced by a unique id prefix within their document.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use sopdoc_types::{
    Block, BlockContent, BlockKind, ChecklistContent, ChecklistItem, Document, DocumentKind, DocumentStatus,
    NewDocument, QuestionContent, QuestionStatus, StepContent, TextContent,
};
use sopdoc_service::{AssemblyFormat, AssemblyOptions, SopConfig, SopService};

#[derive(Parser, Debug)]
#[command(name = "sopdoc", version)]
#[command(about = "Block-based SOP documents: build, validate, render")]
struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/sopdoc/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a draft document
    Create {
        key: String,
        title: String,
        /// sop, procedure, checklist or policy
        #[arg(long, default_value = "sop")]
        kind: String,
        /// Free-form metadata as KEY=VALUE (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// List documents
    List,
    /// Show a document header and its blocks
    Show { document: String },
    /// Add a block (content is JSON, or plain text for text kinds)
    Add {
        document: String,
        kind: String,
        content: String,
        /// Insert at this position instead of appending
        #[arg(long)]
        position: Option<u32>,
        /// Block metadata as KEY=VALUE (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// Replace a block's content
    Update {
        document: String,
        block: String,
        content: String,
    },
    /// Copy a block to the position right after it
    Duplicate { document: String, block: String },
    /// Move a block to a new position
    Move {
        document: String,
        block: String,
        position: u32,
    },
    /// Delete a block, or the whole document with --document-only
    Delete {
        document: String,
        block: Option<String>,
        #[arg(long, conflicts_with = "block")]
        document_only: bool,
    },
    /// Render a document
    Render {
        document: String,
        /// html, markdown, plain_text or json (default from config)
        #[arg(short, long)]
        format: Option<String>,
        /// Include a table of contents
        #[arg(long)]
        toc: bool,
        /// Append document metadata
        #[arg(long)]
        metadata: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a document against its kind's template
    Validate { document: String },
    /// Change a document's status
    Status { document: String, status: String },
    /// Import a document from exported JSON
    Import {
        file: PathBuf,
        /// Key for the imported document (default: the exported key)
        #[arg(long)]
        key: Option<String>,
    },
    /// Export a document as JSON
    Export {
        document: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the sample laboratory safety SOP in memory and print it
    Demo {
        #[arg(short, long, default_value = "markdown")]
        format: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))
}

/// JSON if it parses, otherwise the raw string (text shorthand).
///
/// Text kinds only take a JSON object or string, so numbers, booleans and
/// the like (`sopdoc add doc title 2024`) stay text.
fn parse_payload(kind: Option<BlockKind>, raw: &str) -> serde_json::Value {
    let text = || serde_json::Value::String(raw.to_string());
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if kind.is_some_and(|k| k.is_text()) && !(value.is_object() || value.is_string()) => {
            text()
        }
        Ok(value) => value,
        Err(_) => text(),
    }
}

fn resolve_block(svc: &SopService, doc: &Document, query: &str) -> Result<Block> {
    let needle = query.replace('-', "");
    let mut matches: Vec<Block> = svc
        .block_service()
        .get_blocks(doc.id)?
        .into_iter()
        .filter(|b| b.id.matches_hex_prefix(&needle))
        .collect();

    match matches.len() {
        0 => bail!("no block in {} matches {:?}", doc.key, query),
        1 => Ok(matches.remove(0)),
        n => bail!("{:?} matches {} blocks in {}; use a longer prefix", query, n, doc.key),
    }
}

fn print_blocks(blocks: &[Block]) {
    for block in blocks {
        println!(
            "{:>4}  {}  {:<16} {}",
            block.position,
            block.id.short(),
            block.kind().as_str(),
            block.content.summary()
        );
    }
}

fn write_output(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Sample document: title, description, PPE notice, warning, one section
/// with two steps, an open question and a checklist.
fn build_demo(svc: &SopService) -> Result<Document> {
    let doc = svc.create_document(
        NewDocument::new("lab-safety", "Laboratory Safety Procedures")
            .metadata("department", "Laboratory")
            .metadata("risk_level", "medium")
            .metadata("review_frequency", "annual"),
    )?;
    let blocks = svc.block_service();

    let contents = vec![
        BlockContent::title("Laboratory Safety Procedures"),
        BlockContent::description(
            "This document outlines the safety procedures that must be followed when working in the laboratory.",
        ),
        BlockContent::PpeRequired(TextContent {
            text: "Safety goggles, lab coat, and closed-toe shoes must be worn at all times.".into(),
        }),
        BlockContent::Warning(TextContent {
            text: "Failure to follow these procedures may result in serious injury.".into(),
        }),
        BlockContent::section_header("Pre-Entry Procedures"),
        BlockContent::Step(
            StepContent::new(
                "Check safety equipment",
                "Ensure all safety equipment is available and in good condition before entering the laboratory.",
            )
            .number(1)
            .expected_result("All safety equipment is verified and ready for use.")
            .responsible("Laboratory technician")
            .ppe_required(true),
        ),
        BlockContent::Step(
            StepContent::new(
                "Review hazards",
                "Read the hazard assessment for the work planned today.",
            )
            .number(2)
            .responsible("All personnel"),
        ),
        BlockContent::Question(QuestionContent {
            question: "Where is the nearest eyewash station?".into(),
            status: QuestionStatus::Open,
            answer: None,
        }),
        BlockContent::Checklist(ChecklistContent {
            items: vec![
                ChecklistItem { id: 1, text: "Safety goggles".into(), checked: false },
                ChecklistItem { id: 2, text: "Lab coat".into(), checked: false },
                ChecklistItem { id: 3, text: "Closed-toe shoes".into(), checked: false },
            ],
            allow_multiple: true,
        }),
    ];
    for content in contents {
        blocks.add_content(doc.id, content, None)?;
    }
    Ok(doc)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => SopConfig::load_from(path)?,
        None => SopConfig::load()?,
    };

    // Demo never touches the configured database
    if let Command::Demo { format } = &cli.command {
        let svc = SopService::in_memory()?;
        let doc = build_demo(&svc)?;
        let format = AssemblyFormat::parse(format)?;
        let assembled = svc.assemble(doc.id, format, AssemblyOptions::default().with_table_of_contents())?;
        print!("{}", assembled.content);
        let report = svc.validate(doc.id)?;
        eprintln!("\n{} blocks, {} findings", assembled.block_count, report.findings.len());
        for finding in &report.findings {
            eprintln!("  {}", finding);
        }
        return Ok(());
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let svc = SopService::open(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    tracing::debug!("using database {}", db_path.display());

    match cli.command {
        Command::Create { key, title, kind, metadata } => {
            let kind = DocumentKind::from_str(&kind)
                .with_context(|| format!("unknown document kind {:?}", kind))?;
            let mut new = NewDocument::new(key, title).kind(kind);
            for (k, v) in metadata {
                new = new.metadata(k, v);
            }
            let doc = svc.create_document(new)?;
            println!("{} {}", doc.id.short(), doc.key);
        }
        Command::List => {
            for doc in svc.list_documents()? {
                println!(
                    "{}  {:<24} {:<10} {:<10} {}",
                    doc.id.short(),
                    doc.key,
                    doc.kind.as_str(),
                    doc.status.as_str(),
                    doc.title
                );
            }
        }
        Command::Show { document } => {
            let doc = svc.find_document(&document)?;
            println!("{} ({})", doc.title, doc.key);
            println!("id:       {}", doc.id);
            println!("kind:     {}", doc.kind);
            println!("status:   {}", doc.status);
            println!("revision: {}", doc.revision);
            for (k, v) in &doc.metadata {
                println!("{}: {}", k, v);
            }
            println!();
            print_blocks(&svc.block_service().get_blocks(doc.id)?);
        }
        Command::Add { document, kind, content, position, metadata } => {
            let doc = svc.find_document(&document)?;
            let payload = parse_payload(BlockKind::from_str(&kind), &content);
            let metadata = metadata
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
            let block = svc
                .block_service()
                .add_block_with_metadata(doc.id, &kind, payload, metadata, position)?;
            println!("{} at {}", block.id.short(), block.position);
        }
        Command::Update { document, block, content } => {
            let doc = svc.find_document(&document)?;
            let target = resolve_block(&svc, &doc, &block)?;
            let payload = parse_payload(Some(target.kind()), &content);
            let updated = svc.block_service().update_block(target.id, payload)?;
            println!("{} {}", updated.id.short(), updated.content.summary());
        }
        Command::Duplicate { document, block } => {
            let doc = svc.find_document(&document)?;
            let target = resolve_block(&svc, &doc, &block)?;
            let copy = svc.block_service().duplicate_block(target.id)?;
            println!("{} at {}", copy.id.short(), copy.position);
        }
        Command::Move { document, block, position } => {
            let doc = svc.find_document(&document)?;
            let target = resolve_block(&svc, &doc, &block)?;
            svc.block_service().reorder_block(target.id, position)?;
            print_blocks(&svc.block_service().get_blocks(doc.id)?);
        }
        Command::Delete { document, block, document_only } => {
            let doc = svc.find_document(&document)?;
            match block {
                Some(block) => {
                    let target = resolve_block(&svc, &doc, &block)?;
                    svc.block_service().delete_block(target.id)?;
                    println!("deleted block {}", target.id.short());
                }
                None if document_only => {
                    svc.delete_document(doc.id)?;
                    println!("deleted document {}", doc.key);
                }
                None => bail!("specify a block, or --document-only to delete {}", doc.key),
            }
        }
        Command::Render { document, format, toc, metadata, output } => {
            let doc = svc.find_document(&document)?;
            let format = match format {
                Some(tag) => AssemblyFormat::parse(&tag)?,
                None => config.assembly.format,
            };
            let mut options = config.assembly.options();
            options.include_table_of_contents |= toc;
            options.include_metadata |= metadata;
            let assembled = svc.assemble(doc.id, format, options)?;
            write_output(&assembled.content, output.as_ref())?;
        }
        Command::Validate { document } => {
            let doc = svc.find_document(&document)?;
            let report = svc.validate(doc.id)?;
            if report.findings.is_empty() {
                println!("{}: ok ({} blocks)", doc.key, report.block_count);
            }
            for finding in &report.findings {
                println!("{}: {}", doc.key, finding);
            }
            if !report.is_valid() {
                std::process::exit(1);
            }
        }
        Command::Status { document, status } => {
            let doc = svc.find_document(&document)?;
            let status = DocumentStatus::from_str(&status)
                .with_context(|| format!("unknown status {:?}", status))?;
            let doc = svc.set_status(doc.id, status)?;
            println!("{} {}", doc.key, doc.status);
        }
        Command::Import { file, key } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let doc = svc.import_json(&json, key.as_deref())?;
            println!("{} {}", doc.id.short(), doc.key);
        }
        Command::Export { document, output } => {
            let doc = svc.find_document(&document)?;
            let json = svc.export_json(doc.id)?;
            write_output(&json, output.as_ref())?;
        }
        Command::Demo { .. } => unreachable!("handled above"),
    }

    Ok(())
}
