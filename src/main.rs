//! `hybrid-rag` — question answering over a local document collection.
//!
//! # Usage
//!
//! ```text
//! hybrid-rag [--config <path>] [--docs <path>] [--question <text>]
//!            [--mode vector|graph|hybrid] [--top-k <n>] [--log-level <level>]
//! ```
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config, init logger (CLI `--log-level` > `RUST_LOG` > config)
//!   3. `--docs`: load + chunk + ingest + build + save to `storage_dir`;
//!      otherwise load the saved pipeline from `storage_dir`
//!   4. `--question`: answer once and exit; otherwise start the shell
//!
//! Shell commands: `vector`, `graph`, `hybrid` switch the search mode,
//! `stats` prints index counts, `quit` / `exit` / `q` leave. Any other line
//! is a question.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use tracing::{info, warn};

use hybrid_rag::config;
use hybrid_rag::error::RagError;
use hybrid_rag::llm::{self, GenerationParams, GenerationProvider};
use hybrid_rag::loader;
use hybrid_rag::logger;
use hybrid_rag::persistence::CHUNKS_FILE;
use hybrid_rag::pipeline::{Answer, RagPipeline};
use hybrid_rag::retrieval::fusion::SearchMode;

const PREVIEW_CHARS: usize = 160;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

// ── CLI arg parsing ────────────────────────────────────────────────────────

#[derive(Default)]
struct Args {
    config: Option<PathBuf>,
    docs: Option<PathBuf>,
    question: Option<String>,
    mode: Option<SearchMode>,
    top_k: Option<usize>,
    log_level: Option<String>,
}

fn parse_args() -> Result<Args, RagError> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| RagError::Config(format!("{arg} requires a value")))
        };
        match arg.as_str() {
            "--config" | "-c" => args.config = Some(PathBuf::from(value()?)),
            "--docs" | "-d" => args.docs = Some(PathBuf::from(value()?)),
            "--question" | "-q" => args.question = Some(value()?),
            "--mode" | "-m" => args.mode = Some(value()?.parse()?),
            "--top-k" | "-k" => {
                let raw = value()?;
                let k = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|k| *k > 0)
                    .ok_or_else(|| RagError::Config(format!("--top-k must be a positive integer, got '{raw}'")))?;
                args.top_k = Some(k);
            }
            "--log-level" | "-l" => {
                let raw = value()?;
                logger::parse_level(&raw)?;
                args.log_level = Some(raw);
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(RagError::Config(format!("unknown argument '{other}' (try --help)"))),
        }
    }
    Ok(args)
}

fn print_help() {
    eprintln!("usage: hybrid-rag [flags]");
    eprintln!();
    eprintln!("flags:");
    eprintln!("  --config,   -c <path>   config file (default: config/default.toml)");
    eprintln!("  --docs,     -d <path>   index a file or directory, then save the pipeline");
    eprintln!("  --question, -q <text>   answer one question and exit");
    eprintln!("  --mode,     -m <mode>   vector | graph | hybrid (default from config)");
    eprintln!("  --top-k,    -k <n>      chunks to retrieve (default from config)");
    eprintln!("  --log-level, -l <level> error | warn | info | debug | trace");
    eprintln!("  --help,     -h          print this help");
    eprintln!();
    eprintln!("shell commands:");
    eprintln!("  vector | graph | hybrid   switch search mode");
    eprintln!("  stats                     show index statistics");
    eprintln!("  quit | exit | q           leave");
    eprintln!();
    eprintln!("environment:");
    eprintln!("  HYBRID_RAG_STORAGE_DIR, HYBRID_RAG_LOG_LEVEL, LLM_API_KEY, EMBEDDING_API_KEY");
}

// ── Entry ─────────────────────────────────────────────────────────────────────

fn run() -> Result<(), RagError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_args()?;
    let cfg = config::load(args.config.as_deref())?;
    let rust_log = std::env::var("RUST_LOG").ok();
    let log = logger::LogSettings::resolve(&cfg, args.log_level.as_deref(), rust_log.as_deref())?;
    logger::init(&log)?;
    if let Some(bad) = &log.rejected_env {
        warn!(rust_log = %bad, "ignoring unparsable RUST_LOG");
    }

    info!(
        storage_dir = %cfg.storage_dir.display(),
        embedding = %cfg.embedding.provider,
        llm = %cfg.llm.provider,
        log_filter = %log.directive,
        log_source = %log.source,
        "config loaded"
    );

    let generator =
        llm::providers::build(&cfg.llm, cfg.llm_api_key.clone()).map_err(RagError::Generation)?;
    let params = GenerationParams::from(&cfg.llm);
    let mode = args.mode.unwrap_or(cfg.retrieval.default_mode);
    let k = args.top_k.unwrap_or(cfg.retrieval.top_k);

    let pipeline = match &args.docs {
        Some(docs) => {
            let mut pipeline = RagPipeline::from_config(&cfg)?;
            let chunks = loader::load_documents(docs, &cfg.chunking)?;
            pipeline.ingest(chunks);
            pipeline.build_indexes()?;
            pipeline.save(&cfg.storage_dir)?;
            println!(
                "Indexed {} chunks; saved to {}",
                pipeline.stats().chunks,
                cfg.storage_dir.display()
            );
            pipeline
        }
        None => {
            if !cfg.storage_dir.join(CHUNKS_FILE).exists() {
                return Err(RagError::Config(format!(
                    "no saved pipeline in {}; run with --docs <path> first",
                    cfg.storage_dir.display()
                )));
            }
            RagPipeline::open(&cfg)?
        }
    };

    match &args.question {
        Some(question) => {
            let answer = pipeline.ask(question, mode, k, &generator, &params)?;
            print_answer(&answer);
            Ok(())
        }
        None => shell(&pipeline, &generator, &params, mode, k),
    }
}

// ── Shell ─────────────────────────────────────────────────────────────────────

fn shell(
    pipeline: &RagPipeline,
    generator: &GenerationProvider,
    params: &GenerationParams,
    mut mode: SearchMode,
    k: usize,
) -> Result<(), RagError> {
    println!("hybrid-rag ready ({} chunks). Type a question, or 'quit'.", pipeline.stats().chunks);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("[{mode}]> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "stats" => print_stats(pipeline),
            cmd @ ("vector" | "graph" | "hybrid") => {
                mode = cmd.parse()?;
                println!("search mode: {mode}");
            }
            _ => match pipeline.ask(input, mode, k, generator, params) {
                Ok(answer) => print_answer(&answer),
                // Query errors are reported and the shell continues.
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!();
    println!("Answer: {}", answer.answer);
    println!();
    println!("Sources ({}):", answer.mode);
    if answer.sources.is_empty() {
        println!("  (none)");
    }
    for (i, hit) in answer.sources.iter().enumerate() {
        let fmt_sub = |s: Option<f32>| s.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".into());
        println!(
            "  {}. {} #{}  score={:.3}  (vector={}, graph={})",
            i + 1,
            hit.source,
            hit.chunk_index,
            hit.score,
            fmt_sub(hit.contributing.vector),
            fmt_sub(hit.contributing.graph),
        );
        let preview: String = hit.text.chars().take(PREVIEW_CHARS).collect();
        println!("     {}", preview.replace('\n', " "));
    }
    println!();
}

fn print_stats(pipeline: &RagPipeline) {
    let s = pipeline.stats();
    println!("chunks:            {}", s.chunks);
    println!("sources:           {}", s.sources);
    println!("embedded:          {}", s.embedded);
    println!("vector rows:       {}", s.vector_rows);
    println!("graph documents:   {}", s.graph_documents);
    println!("graph entities:    {}", s.graph_entities);
    println!("contains edges:    {}", s.contains_edges);
    println!("same-source edges: {}", s.same_source_edges);
}
