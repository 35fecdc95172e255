//! sfm-segments CLI
//!
//! Dump the reference-tagged segments of Standard Format files, or scan
//! files for the books and markers they contain.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use sfm_segments::{
    scan_file, BcvRef, CharMapConverter, ConverterRegistry, DeclaredEncoding, FileDescriptor, ImportDomain,
    ImportProject, ImportSettings, MappingEntry, MappingList, TextSegment,
};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sfm-segments")]
#[command(version)]
#[command(about = "Standard Format segment enumerator")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the segments of an import domain
    Dump {
        /// Files and directories to import, after those of the project file
        inputs: Vec<PathBuf>,

        /// Project file (JSON) with settings, mappings, files and converters
        #[arg(short, long)]
        project: Option<PathBuf>,

        /// Import domain to enumerate
        #[arg(short, long, value_enum, default_value = "main")]
        domain: DomainArg,

        /// First reference to include (`EPH`, `EPH 2`, `EPH 2:3`)
        #[arg(long)]
        from: Option<BcvRef>,

        /// Last reference to include (`COL`, `COL 4`, `COL 4:18`)
        #[arg(long)]
        to: Option<BcvRef>,

        /// Treat input files as legacy 8-bit data
        #[arg(long)]
        legacy: bool,

        /// Print one JSON object per segment
        #[arg(long)]
        json: bool,
    },

    /// List the books and markers found in files
    Scan {
        /// Files and directories to scan
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Treat input files as legacy 8-bit data
        #[arg(long)]
        legacy: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DomainArg {
    Main,
    BackTrans,
    Annotations,
}

impl From<DomainArg> for ImportDomain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Main => ImportDomain::Main,
            DomainArg::BackTrans => ImportDomain::BackTrans,
            DomainArg::Annotations => ImportDomain::Annotations,
        }
    }
}

/// On-disk project description
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ProjectFile {
    settings: ImportSettings,
    mappings: Vec<MappingEntry>,
    files: Vec<FileDescriptor>,
    /// Character-table converters by name
    converters: HashMap<String, HashMap<String, String>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Dump { inputs, project, domain, from, to, legacy, json } => {
            dump_segments(inputs, project, domain.into(), from, to, encoding(legacy), json)?;
        }
        Commands::Scan { inputs, legacy } => {
            scan_files(inputs, encoding(legacy))?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn encoding(legacy: bool) -> DeclaredEncoding {
    if legacy {
        DeclaredEncoding::Legacy
    } else {
        DeclaredEncoding::Unicode
    }
}

fn dump_segments(
    inputs: Vec<PathBuf>,
    project_path: Option<PathBuf>,
    domain: ImportDomain,
    from: Option<BcvRef>,
    to: Option<BcvRef>,
    encoding: DeclaredEncoding,
    json: bool,
) -> Result<()> {
    let project_file = match &project_path {
        Some(path) => load_project(path)?,
        None => ProjectFile::default(),
    };

    let mut registry = ConverterRegistry::new();
    for (name, table) in project_file.converters {
        let converter = CharMapConverter::from_table(table).into_fn();
        registry.register(name, move |text: &str| converter(text));
    }

    let mut project = ImportProject::new(MappingList::from_entries(project_file.mappings), project_file.settings)
        .with_converters(Arc::new(registry));

    for file in project_file.files {
        project.add_file(with_declared_range(file)?);
    }
    for path in collect_files(&inputs)? {
        let descriptor = FileDescriptor::new(path, domain).with_encoding(encoding);
        project.add_file(with_declared_range(descriptor)?);
    }

    let enumerator = match (from, to) {
        (None, None) => project.create_full_enumerator(domain),
        (from, to) => {
            let start = from.unwrap_or_default();
            let end = to.map(range_end).unwrap_or(BcvRef::book_end(u16::MAX));
            project.create_enumerator(domain, start, end)
        }
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut count = 0usize;
    for segment in enumerator {
        let segment = segment?;
        if json {
            serde_json::to_writer(&mut out, &segment)?;
            writeln!(out)?;
        } else {
            write_tsv(&mut out, &segment)?;
        }
        count += 1;
    }
    out.flush()?;

    tracing::info!(count, domain = ?domain, "enumerated segments");
    Ok(())
}

fn load_project(path: &Path) -> Result<ProjectFile> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read project: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid project file: {}", path.display()))
}

/// Fill in the declared range of files that do not state one
fn with_declared_range(file: FileDescriptor) -> Result<FileDescriptor> {
    if file.declared_range.is_some() {
        return Ok(file);
    }
    let scan = scan_file(&file.path, file.encoding)?;
    Ok(file.with_scan(&scan))
}

/// An end given as a book or chapter covers all of it
fn range_end(end: BcvRef) -> BcvRef {
    if end.chapter == 0 {
        BcvRef::book_end(end.book)
    } else if end.verse == 0 {
        BcvRef::new(end.book, end.chapter, u16::MAX)
    } else {
        end
    }
}

fn write_tsv(out: &mut impl Write, segment: &TextSegment) -> io::Result<()> {
    let text = segment.text.replace('\t', " ");
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}",
        segment.first_reference,
        segment.last_reference,
        segment.marker.trim_end(),
        segment.literal_verse_number.as_deref().unwrap_or(""),
        text.trim_end()
    )
}

fn collect_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            tracing::debug!(dir = %input.display(), count = found.len(), "collected directory");
            files.append(&mut found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn scan_files(inputs: Vec<PathBuf>, encoding: DeclaredEncoding) -> Result<()> {
    for path in collect_files(&inputs)? {
        let scan = scan_file(&path, encoding).with_context(|| format!("Failed to scan: {}", path.display()))?;
        let books: Vec<&str> = scan
            .books
            .iter()
            .map(|&b| sfm_segments::reference::book_code(b).unwrap_or("?"))
            .collect();
        let markers: Vec<&str> = scan.markers.iter().map(String::as_str).collect();
        println!(
            "{}\t{} lines\t{}\t{}",
            path.display(),
            scan.line_count,
            books.join(" "),
            markers.join(" ")
        );
    }
    Ok(())
}
