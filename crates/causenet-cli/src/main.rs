//! CauseNet CLI
//!
//! - Building `.causenet` files from the CauseNet JSONL export
//! - Inspecting and verifying built files
//! - Concept, effect, support and path queries (JSON on stdout)

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use causenet_ingest_jsonl::{ClueWebIdMap, IdRemap, NoRemap};
use causenet_store::{
    build_causenet, component_sizes, connected_components, BuildOptions, Causenet,
    CausenetQueries, PathWeighting, WriterOptions,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;

mod logging;

#[derive(Parser)]
#[command(name = "causenet")]
#[command(author, version, about = "CauseNet: compact causal graph storage and queries")]
struct Cli {
    /// Emit logs as JSON (filter with CAUSENET_LOG).
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a `.causenet` file from a CauseNet JSONL export.
    Build {
        /// Input JSONL file
        input: PathBuf,
        /// Output `.causenet` file
        #[arg(short, long)]
        out: PathBuf,
        /// Tab-separated `<warc-id>\t<trec-id>` table for ClueWeb12 sources
        #[arg(long)]
        clueweb_id_map: Option<PathBuf>,
        /// Directory for staging files (default: next to the output)
        #[arg(long)]
        staging_dir: Option<PathBuf>,
        /// Expected record count for percentage progress; `0` counts the input first
        #[arg(long)]
        expected_records: Option<u64>,
        /// Log progress every N records (0 disables)
        #[arg(long, default_value_t = 100_000)]
        progress_every: u64,
    },

    /// Print header and section sizes.
    Info { file: PathBuf },

    /// Check every offset in the file.
    Verify { file: PathBuf },

    /// List concept names.
    Concepts {
        file: PathBuf,
        /// Maximum number of names to print
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a concept and the names of its effects.
    Concept { file: PathBuf, name: String },

    /// Show only the effect names of a concept.
    Effects { file: PathBuf, name: String },

    /// Show the supports of the edge `cause -> effect`.
    Support {
        file: PathBuf,
        cause: String,
        effect: String,
    },

    /// Shortest causal path between two concepts.
    Path {
        file: PathBuf,
        from: String,
        to: String,
        #[arg(long, value_enum, default_value_t = Weighting::Support)]
        weighting: Weighting,
    },

    /// Connected components of the graph, ignoring edge direction.
    Components {
        file: PathBuf,
        /// Number of largest components to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Weighting {
    /// Edge cost is its support count
    Support,
    /// Every edge costs 1
    Hops,
}

impl From<Weighting> for PathWeighting {
    fn from(w: Weighting) -> Self {
        match w {
            Weighting::Support => PathWeighting::SupportCount,
            Weighting::Hops => PathWeighting::Hops,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs);

    match cli.command {
        Commands::Build {
            input,
            out,
            clueweb_id_map,
            staging_dir,
            expected_records,
            progress_every,
        } => cmd_build(
            &input,
            &out,
            clueweb_id_map.as_deref(),
            staging_dir,
            expected_records,
            progress_every,
        ),
        Commands::Info { file } => cmd_info(&file),
        Commands::Verify { file } => cmd_verify(&file),
        Commands::Concepts { file, limit } => cmd_concepts(&file, limit),
        Commands::Concept { file, name } => {
            let causenet = open(&file)?;
            let view = CausenetQueries::new(&causenet)
                .concept(&name)
                .ok_or_else(|| not_found(&name))?;
            print_json(&view)
        }
        Commands::Effects { file, name } => {
            let causenet = open(&file)?;
            let effects = CausenetQueries::new(&causenet)
                .effect_names(&name)
                .ok_or_else(|| not_found(&name))?;
            print_json(&effects)
        }
        Commands::Support {
            file,
            cause,
            effect,
        } => {
            let causenet = open(&file)?;
            let queries = CausenetQueries::new(&causenet);
            let supports = queries
                .supports(&cause, &effect)
                .ok_or_else(|| not_found_pair(&queries, &cause, &effect))?;
            print_json(&supports)
        }
        Commands::Path {
            file,
            from,
            to,
            weighting,
        } => {
            let causenet = open(&file)?;
            let queries = CausenetQueries::new(&causenet);
            let path = queries
                .path(&from, &to, weighting.into())
                .ok_or_else(|| not_found_pair(&queries, &from, &to))?;
            print_json(&path)
        }
        Commands::Components { file, top } => cmd_components(&file, top),
    }
}

fn open(path: &Path) -> Result<Causenet> {
    Causenet::open(path).with_context(|| format!("failed to open {}", path.display()))
}

fn not_found(name: &str) -> anyhow::Error {
    anyhow!("concept not found: {name}")
}

fn not_found_pair(queries: &CausenetQueries<'_>, a: &str, b: &str) -> anyhow::Error {
    let missing = if queries.resolve(a).is_none() { a } else { b };
    not_found(missing)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_build(
    input: &Path,
    out: &Path,
    clueweb_id_map: Option<&Path>,
    staging_dir: Option<PathBuf>,
    expected_records: Option<u64>,
    progress_every: u64,
) -> Result<()> {
    eprintln!("{} {}", "Building".green().bold(), input.display());

    let remap: Box<dyn IdRemap> = match clueweb_id_map {
        Some(path) => {
            let map = ClueWebIdMap::load(path)?;
            tracing::info!(entries = map.len(), "loaded ClueWeb12 id map");
            Box::new(map)
        }
        None => Box::new(NoRemap),
    };
    let expected_records = match expected_records {
        Some(0) => Some(causenet_ingest_jsonl::count_records(input)?),
        other => other,
    };

    let file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let records = causenet_ingest_jsonl::read_relations(BufReader::new(file), remap.as_ref());
    let options = BuildOptions {
        writer: WriterOptions { staging_dir },
        progress_every,
        expected_records,
    };
    let summary = build_causenet(records, out, &options)
        .with_context(|| format!("failed to build {}", out.display()))?;

    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    print_json(&summary)
}

#[derive(Serialize)]
struct FileInfo {
    concepts: u64,
    bytes: usize,
    node_index_bytes: u64,
    node_info_bytes: u64,
    content_bytes: u64,
}

fn cmd_info(path: &Path) -> Result<()> {
    let causenet = open(path)?;
    let header = causenet.header();
    print_json(&FileInfo {
        concepts: header.node_count,
        bytes: causenet.file_len(),
        node_index_bytes: header.info_offset - header.concept_offset,
        node_info_bytes: header.support_offset - header.info_offset,
        content_bytes: causenet.file_len() as u64 - header.support_offset,
    })
}

fn cmd_verify(path: &Path) -> Result<()> {
    let causenet = open(path)?;
    let report = causenet
        .verify()
        .with_context(|| format!("{} failed verification", path.display()))?;
    eprintln!("{} {}", "ok".green().bold(), path.display());
    print_json(&report)
}

fn cmd_concepts(path: &Path, limit: Option<usize>) -> Result<()> {
    let causenet = open(path)?;
    let names: Vec<String> = causenet
        .concepts()
        .take(limit.unwrap_or(usize::MAX))
        .map(|c| c.into_owned())
        .collect();
    print_json(&names)
}

#[derive(Serialize)]
struct ComponentSummary {
    components: usize,
    largest: Vec<ComponentSize>,
}

#[derive(Serialize)]
struct ComponentSize {
    label: u32,
    size: usize,
}

fn cmd_components(path: &Path, top: usize) -> Result<()> {
    let causenet = open(path)?;
    let n = causenet.concept_count();

    // The file only stores outgoing edges; symmetrize in memory.
    let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); n];
    for cause in 0..n as u32 {
        for (effect, _) in causenet.effects(cause) {
            adjacency[cause as usize].push(effect);
            adjacency[effect as usize].push(cause);
        }
    }
    tracing::info!(concepts = n, "built undirected adjacency");

    let labels = connected_components(n, |node: u32| {
        adjacency[node as usize].iter().map(|&m| (m, 1u32))
    });
    let sizes = component_sizes(&labels);
    let mut largest: Vec<ComponentSize> = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| ComponentSize {
            label: i as u32 + 1,
            size,
        })
        .collect();
    largest.sort_by(|a, b| b.size.cmp(&a.size).then(a.label.cmp(&b.label)));
    largest.truncate(top);

    print_json(&ComponentSummary {
        components: sizes.len(),
        largest,
    })
}
