use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mcclintock::script::{self, EditOp, ScriptOp};
use mcclintock::GenomeStore;

#[derive(Parser, Debug)]
#[command(name = "mcclintock", about = "Editable genome store with k-mer indexed search")]
struct Cli {
    /// K-mer window length used by the index.
    #[arg(long, global = true, default_value_t = mcclintock::DEFAULT_K)]
    k: usize,

    /// Fixed skip-list promotion seed for reproducible runs.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply an edit script to a reference and report timings.
    Edits {
        /// Reference sequence (plain bytes or header-stripped FASTA).
        reference: PathBuf,
        /// Edit script (`I <pos> <text>`, `D <start> <end>`, `S <pos> <text>`).
        edits: PathBuf,
        /// Apply at most this many edits.
        #[arg(long)]
        limit: Option<usize>,
        /// Write the indices of rejected edits to this file.
        #[arg(long)]
        failed_out: Option<PathBuf>,
    },
    /// Run a combined edit+query script, timing the searches.
    Queries {
        /// Reference sequence (plain bytes or header-stripped FASTA).
        reference: PathBuf,
        /// Combined script with interleaved edit and `Q` lines.
        script: PathBuf,
    },
    /// Extract substrings listed as `position,length` pairs.
    Substrings {
        /// Reference sequence (plain bytes or header-stripped FASTA).
        reference: PathBuf,
        /// Extraction script, one pair per line.
        script: PathBuf,
    },
    /// Search for a single pattern and print its positions.
    Search {
        /// Reference sequence (plain bytes or header-stripped FASTA).
        reference: PathBuf,
        /// Pattern to look up.
        pattern: String,
    },
    /// Print index and translation-structure statistics.
    Stats {
        /// Reference sequence (plain bytes or header-stripped FASTA).
        reference: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Edits {
            reference,
            edits,
            limit,
            failed_out,
        } => run_edits(&reference, &edits, cli.k, cli.seed, limit, failed_out),
        Commands::Queries { reference, script } => {
            run_queries(&reference, &script, cli.k, cli.seed)
        }
        Commands::Substrings { reference, script } => {
            run_substrings(&reference, &script, cli.k, cli.seed)
        }
        Commands::Search { reference, pattern } => {
            run_search(&reference, &pattern, cli.k, cli.seed)
        }
        Commands::Stats { reference } => run_stats(&reference, cli.k, cli.seed),
    }
}

/// Load the reference, build the store, and time hash construction.
fn build_store(reference: &PathBuf, k: usize, seed: Option<u64>) -> Result<GenomeStore> {
    let sequence = script::read_sequence(reference)?;
    info!(bases = sequence.len(), "loaded reference");

    let mut store = match seed {
        Some(seed) => GenomeStore::with_seed(sequence, k, seed),
        None => GenomeStore::new(sequence, k),
    }
    .context("failed to initialize genome store")?;

    let started = Instant::now();
    store.construct_hash();
    info!(elapsed = ?started.elapsed(), k, "constructed k-mer hash");
    Ok(store)
}

fn run_edits(
    reference: &PathBuf,
    edits_path: &PathBuf,
    k: usize,
    seed: Option<u64>,
    limit: Option<usize>,
    failed_out: Option<PathBuf>,
) -> Result<()> {
    let mut store = build_store(reference, k, seed)?;
    let edits = script::parse_edit_script(script::open_script(edits_path)?)
        .with_context(|| format!("failed to parse edit script {}", edits_path.display()))?;
    let quota = limit.unwrap_or(edits.len()).min(edits.len());

    let mut inserts = 0usize;
    let mut deletes = 0usize;
    let mut substitutions = 0usize;
    let mut failed = Vec::new();

    let started = Instant::now();
    for (index, edit) in edits.iter().take(quota).enumerate() {
        let applied = apply_edit(&mut store, edit, index);
        match edit {
            EditOp::Insert { .. } => inserts += 1,
            EditOp::Delete { .. } => deletes += 1,
            EditOp::Substitute { .. } => substitutions += 1,
        }
        if !applied {
            failed.push(index);
        }
    }
    let elapsed = started.elapsed();

    info!(?elapsed, edits = quota, "applied edit script");
    println!("Total Insertions: {inserts}");
    println!("Total Deletions: {deletes}");
    println!("Total SNPs: {substitutions}");
    println!("Rejected edits: {}", failed.len());
    println!("Final length: {}", store.len());

    if let Some(path) = failed_out {
        let mut body = String::new();
        for index in &failed {
            body.push_str(&index.to_string());
            body.push('\n');
        }
        fs::write(&path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), count = failed.len(), "wrote rejected edit indices");
    }
    Ok(())
}

/// Apply one edit, reporting rejections without aborting the batch.
fn apply_edit(store: &mut GenomeStore, edit: &EditOp, index: usize) -> bool {
    match edit {
        EditOp::Insert { position, text } => match store.insert_at(text, *position) {
            Ok(()) => true,
            Err(err) => {
                warn!(index, %err, "insert rejected");
                false
            }
        },
        EditOp::Delete { start, end } => {
            match store.delete_at(*start, EditOp::delete_len(*start, *end)) {
                Ok(true) => true,
                Ok(false) => {
                    debug!(index, start, end, "delete could not be reconciled");
                    false
                }
                Err(err) => {
                    warn!(index, %err, "delete rejected");
                    false
                }
            }
        }
        EditOp::Substitute { position, text } => match store.snp_at(*position, text) {
            Ok(()) => true,
            Err(err) => {
                warn!(index, %err, "substitution rejected");
                false
            }
        },
    }
}

fn run_queries(
    reference: &PathBuf,
    script_path: &PathBuf,
    k: usize,
    seed: Option<u64>,
) -> Result<()> {
    let mut store = build_store(reference, k, seed)?;
    let ops = script::parse_mixed_script(script::open_script(script_path)?)
        .with_context(|| format!("failed to parse query script {}", script_path.display()))?;

    let mut edit_count = 0usize;
    let mut query_count = 0usize;
    let mut total_hits = 0usize;
    let mut search_time = std::time::Duration::ZERO;

    for (index, op) in ops.iter().enumerate() {
        match op {
            ScriptOp::Edit(edit) => {
                apply_edit(&mut store, edit, index);
                edit_count += 1;
            }
            ScriptOp::Query(pattern) => {
                let started = Instant::now();
                let hits = store
                    .search(pattern)
                    .context("search requires a constructed hash")?;
                search_time += started.elapsed();
                query_count += 1;
                total_hits += hits.len();
                debug!(
                    pattern = %String::from_utf8_lossy(pattern),
                    hits = hits.len(),
                    "query"
                );
            }
        }
    }

    info!(?search_time, query_count, "finished query script");
    println!("Edits applied: {edit_count}");
    println!("Queries: {query_count}");
    println!("Total hits: {total_hits}");
    println!("Search time: {search_time:?}");
    Ok(())
}

fn run_substrings(
    reference: &PathBuf,
    script_path: &PathBuf,
    k: usize,
    seed: Option<u64>,
) -> Result<()> {
    let sequence = script::read_sequence(reference)?;
    let store = match seed {
        Some(seed) => GenomeStore::with_seed(sequence, k, seed),
        None => GenomeStore::new(sequence, k),
    }
    .context("failed to initialize genome store")?;

    let pairs = script::parse_extract_script(script::open_script(script_path)?)
        .with_context(|| format!("failed to parse extraction script {}", script_path.display()))?;

    let mut extracted = 0usize;
    let mut bytes = 0usize;
    let started = Instant::now();
    for &(position, length) in &pairs {
        match store.read_at(position, length) {
            Ok((substring, physical)) => {
                extracted += 1;
                bytes += substring.len();
                debug!(position, length, physical, "extracted substring");
            }
            Err(err) => warn!(position, length, %err, "extraction skipped"),
        }
    }
    let elapsed = started.elapsed();

    info!(?elapsed, extracted, "finished extraction script");
    println!("Extracted {extracted} substrings ({bytes} bytes)");
    println!("Extraction time: {elapsed:?}");
    Ok(())
}

fn run_search(reference: &PathBuf, pattern: &str, k: usize, seed: Option<u64>) -> Result<()> {
    let store = build_store(reference, k, seed)?;
    let started = Instant::now();
    let hits = store.search(pattern.as_bytes())?;
    let elapsed = started.elapsed();

    info!(?elapsed, hits = hits.len(), "searched pattern");
    if hits.is_empty() {
        println!("Pattern not found.");
    } else {
        let rendered: Vec<String> = hits.iter().map(ToString::to_string).collect();
        println!("{}", rendered.join(" "));
    }
    Ok(())
}

fn run_stats(reference: &PathBuf, k: usize, seed: Option<u64>) -> Result<()> {
    let store = build_store(reference, k, seed)?;
    let stats = store.stats()?;
    println!("Length: {}", stats.length);
    println!("Breakpoints: {}", stats.breakpoints);
    println!("Skip-list levels: {}", stats.levels);
    println!("Distinct k-mers: {}", stats.distinct_kmers);
    println!("Indexed occurrences: {}", stats.occurrences);
    println!("Load factor: {:.3}", stats.load_factor);
    Ok(())
}
