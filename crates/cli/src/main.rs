//! `strata` command-line client.
//!
//! Runs queries against persisted graph datasets, prints dataset shape, and
//! packs JSON graph descriptions into dataset directories. Queries arrive
//! pre-embedded as JSON number arrays; wiring a real text encoder means
//! implementing `QueryEncoder` against whatever serves the model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use strata_core::config;
use strata_core::encoder::QueryEncoder;
use strata_core::engine::DistanceStrategy;
use strata_core::error::{Result as SearchResult, SearchError};
use strata_core::quantization::ScalarCodec;
use strata_core::session::{SearchOutcome, SearchSession, SessionConfig};
use strata_core::store::{
    save_dataset, DatasetVariant, DocTable, EdgeTable, GraphTables, LocalGraphStore, NodeTable,
    VectorArena,
};

#[derive(Parser)]
#[command(name = "strata", about = "Query pre-built layered proximity graphs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one query against a dataset and print the matched documents
    Query {
        /// Dataset directory
        #[arg(short, long)]
        dataset: PathBuf,

        /// Read the quantized table variant and search in quantized space
        #[arg(long, default_value_t = false)]
        quantized: bool,

        /// Quantization precision in bits per dimension (with --quantized)
        #[arg(long, default_value_t = config::DEFAULT_BITS_PER_DIMENSION)]
        bits: u32,

        /// Number of results to return
        #[arg(short, long, default_value_t = config::DEFAULT_K)]
        k: usize,

        /// Beam width during search
        #[arg(long, default_value_t = config::DEFAULT_EF)]
        ef: usize,

        /// Query embedding as a JSON number array, e.g. "[0.1, -0.5, 0.8]"
        embedding: String,
    },
    /// Print dataset shape: node count, dimension, encoding, edges
    Info {
        /// Dataset directory
        #[arg(short, long)]
        dataset: PathBuf,

        /// Inspect the quantized table variant
        #[arg(long, default_value_t = false)]
        quantized: bool,
    },
    /// Pack a JSON graph description into dataset table files
    Pack {
        /// Input JSON: {"vectors": [[..]], "edges": [[src, dst, layer]], "docs": [".."]}
        input: PathBuf,

        /// Output dataset directory
        #[arg(short, long)]
        out: PathBuf,

        /// Also write the quantized variant at this precision
        #[arg(long)]
        quantize_bits: Option<u32>,
    },
}

/// Offline graph description accepted by `strata pack`.
#[derive(Deserialize)]
struct PackInput {
    vectors: Vec<Vec<f32>>,
    edges: Vec<(u32, u32, u32)>,
    docs: Vec<String>,
}

/// Encoder for pre-embedded queries: the query "text" is a JSON number
/// array, decoded as-is.
struct InlineVectorEncoder;

#[async_trait]
impl QueryEncoder for InlineVectorEncoder {
    async fn embed(&self, text: &str) -> SearchResult<Vec<f32>> {
        serde_json::from_str(text).map_err(|e| {
            SearchError::Embedding(format!("query is not a JSON number array: {}", e))
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "strata_core=info".parse().expect("valid directive literal"),
        ))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Query {
            dataset,
            quantized,
            bits,
            k,
            ef,
            embedding,
        } => run_query(dataset, quantized, bits, k, ef, &embedding).await,
        Command::Info { dataset, quantized } => run_info(dataset, quantized),
        Command::Pack {
            input,
            out,
            quantize_bits,
        } => run_pack(&input, &out, quantize_bits),
    }
}

fn open_store(dataset: &Path, quantized: bool) -> Result<LocalGraphStore, Box<dyn std::error::Error>> {
    if !dataset.is_dir() {
        eprintln!("Error: dataset '{}' is not a directory", dataset.display());
        std::process::exit(1);
    }
    let variant = if quantized {
        DatasetVariant::Quantized
    } else {
        DatasetVariant::Plain
    };
    Ok(LocalGraphStore::open(dataset, variant)?)
}

async fn run_query(
    dataset: PathBuf,
    quantized: bool,
    bits: u32,
    k: usize,
    ef: usize,
    embedding: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if quantized && !(1..=31).contains(&bits) {
        eprintln!("Error: --bits must be in 1..=31, got {}", bits);
        std::process::exit(1);
    }
    let store = Arc::new(open_store(&dataset, quantized)?);
    let strategy = if quantized {
        DistanceStrategy::Quantized { bits }
    } else {
        DistanceStrategy::Raw
    };
    let session = SearchSession::new(
        store,
        Arc::new(InlineVectorEncoder),
        SessionConfig { k, ef, strategy },
    )?;

    match session.search(embedding).await? {
        SearchOutcome::Completed(hits) => {
            if hits.is_empty() {
                println!("no results (empty dataset or k = 0)");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!("{:>3}. [node {}] {}", rank + 1, hit.node_id, hit.text);
            }
        }
        SearchOutcome::Superseded => unreachable!("a single query cannot be superseded"),
    }
    Ok(())
}

fn run_info(dataset: PathBuf, quantized: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&dataset, quantized)?;
    let count = store.node_count();
    println!("dataset:    {}", dataset.display());
    println!("nodes:      {}", count);
    println!("dimension:  {}", store.dim());
    println!("encoding:   {}", store.encoding());
    println!("edges:      {}", store.edge_count());
    // Same layer derivation the search uses.
    let layers = if count == 0 { 0 } else { (count as u64).ilog2() + 1 };
    println!("layers:     {}", layers);
    Ok(())
}

fn run_pack(
    input: &Path,
    out: &Path,
    quantize_bits: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(input)?;
    let parsed: PackInput = serde_json::from_str(&raw)?;

    let dim = parsed.vectors.first().map_or(0, |v| v.len());
    for (row, v) in parsed.vectors.iter().enumerate() {
        if v.len() != dim {
            eprintln!(
                "Error: vector {} has {} components, expected {}",
                row,
                v.len(),
                dim
            );
            std::process::exit(1);
        }
    }

    let mut data = Vec::with_capacity(parsed.vectors.len() * dim);
    for v in &parsed.vectors {
        data.extend_from_slice(v);
    }
    let tables = GraphTables {
        nodes: NodeTable {
            ids: (0..parsed.vectors.len() as u32).collect(),
            vectors: VectorArena::F32 { dim, data },
        },
        edges: EdgeTable {
            sources: parsed.edges.iter().map(|e| e.0).collect(),
            targets: parsed.edges.iter().map(|e| e.1).collect(),
            layers: parsed.edges.iter().map(|e| e.2).collect(),
        },
        docs: DocTable { texts: parsed.docs },
    };

    save_dataset(out, DatasetVariant::Plain, &tables)?;
    println!(
        "packed {} nodes, {} edges into {}",
        tables.nodes.ids.len(),
        tables.edges.len(),
        out.display()
    );

    if let Some(bits) = quantize_bits {
        let codec = match ScalarCodec::new(bits) {
            Ok(codec) => codec,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
        let mut quantized = tables;
        quantized.nodes.vectors = quantized.nodes.vectors.quantize(&codec)?;
        save_dataset(out, DatasetVariant::Quantized, &quantized)?;
        println!("packed quantized variant at {} bits per dimension", bits);
    }

    Ok(())
}
