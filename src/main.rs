//! Command-line front end for Tanya.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use tanya_lib::application::services::RecordSource;
use tanya_lib::application::{SearchRequest, SearchResponse};
use tanya_lib::infrastructure::dataset::{read_entries_from_path, write_records};
use tanya_lib::{
    build_backend_response, build_environment_with, remember_dataset, switch_backend,
    EnvironmentOptions,
};

/// Tanya: hybrid semantic and keyword answer search over Q&A tables.
#[derive(Parser)]
#[command(name = "tanya", version, about)]
struct Cli {
    /// Dataset path or URL; overrides TANYA_DATASET and the config file.
    #[arg(long, global = true)]
    dataset: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank stored answers against a question.
    Search(SearchArgs),

    /// Embed a raw Q&A table so it can be searched semantically.
    Embed(EmbedArgs),

    /// Show what the loaded dataset contains.
    Inspect,

    /// List embedding backends, or switch the active one.
    Backends(BackendArgs),

    /// Make a dataset the default for later runs once it loads cleanly.
    Use(UseArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Question text; multiple words are joined with spaces.
    #[arg(required = true)]
    query: Vec<String>,

    /// Drop groups scoring below this value.
    #[arg(long)]
    min_score: Option<f32>,

    /// Maximum number of groups to return.
    #[arg(long, short = 'k')]
    top_k: Option<usize>,
}

#[derive(Args)]
struct EmbedArgs {
    /// Raw table: `[{ "question": ..., "answer": ... }]`.
    #[arg(long, short)]
    input: PathBuf,

    /// Where to write the embedded records.
    #[arg(long, short)]
    output: PathBuf,
}

#[derive(Args)]
struct BackendArgs {
    /// Backend id to activate (see the list for valid ids).
    #[arg(long)]
    set: Option<String>,

    /// Model name for the activated backend.
    #[arg(long, requires = "set")]
    model: Option<String>,
}

#[derive(Args)]
struct UseArgs {
    /// Path or http(s) URL of an embedded table.
    location: String,
}

fn main() -> Result<()> {
    tanya_lib::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Search(ref args) => run_search(&cli, args),
        Command::Embed(ref args) => run_embed(&cli, args),
        Command::Inspect => run_inspect(&cli),
        Command::Backends(ref args) => run_backends(&cli, args),
        Command::Use(ref args) => run_use(&cli, args),
    }
}

fn run_search(cli: &Cli, args: &SearchArgs) -> Result<()> {
    let handles = build_environment_with(EnvironmentOptions {
        dataset: cli.dataset.clone(),
        skip_dataset: false,
    })?;

    let request = SearchRequest {
        query: args.query.join(" "),
        min_score: args.min_score,
        top_k: args.top_k,
    };
    let response = handles.service.search(request).context("search failed")?;

    if cli.json {
        return print_json(&response);
    }
    print_results(&response);
    Ok(())
}

fn run_embed(cli: &Cli, args: &EmbedArgs) -> Result<()> {
    let handles = build_environment_with(EnvironmentOptions {
        dataset: None,
        skip_dataset: true,
    })?;

    let entries = read_entries_from_path(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let records = handles
        .service
        .embed_dataset(entries)
        .context("failed to embed dataset")?;
    write_records(&args.output, &records)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if cli.json {
        return print_json(&serde_json::json!({
            "output": args.output.display().to_string(),
            "records": records.len(),
            "dimensions": records.first().map(|record| record.dims()),
        }));
    }
    println!(
        "Wrote {} records to {}",
        records.len(),
        args.output.display()
    );
    Ok(())
}

fn run_inspect(cli: &Cli) -> Result<()> {
    let handles = build_environment_with(EnvironmentOptions {
        dataset: cli.dataset.clone(),
        skip_dataset: false,
    })?;
    let summary = handles.service.dataset_info();
    let config_path = handles.config.path().display().to_string();

    if cli.json {
        return print_json(&serde_json::json!({
            "dataset": summary,
            "config": config_path,
        }));
    }
    println!("Config:     {}", config_path);
    println!("Source:     {}", summary.source);
    println!("Records:    {}", summary.records);
    println!("Questions:  {}", summary.questions);
    match summary.dimensions {
        Some(dims) => println!("Dimensions: {}", dims),
        None => println!("Dimensions: -"),
    }
    println!("Loaded at:  {}", summary.loaded_at.to_rfc3339());
    Ok(())
}

fn run_backends(cli: &Cli, args: &BackendArgs) -> Result<()> {
    let handles = build_environment_with(EnvironmentOptions {
        dataset: None,
        skip_dataset: true,
    })?;

    let response = match &args.set {
        Some(backend_id) => {
            let cell = handles.service_cell();
            let source = Arc::clone(&handles.dataset) as Arc<dyn RecordSource>;
            switch_backend(&cell, &handles.config, source, backend_id, args.model.clone())?
        }
        None => build_backend_response(handles.config.current().embedding, &handles.service),
    };

    if cli.json {
        return print_json(&response);
    }
    for option in &response.options {
        let marker = if option.id == response.active { "*" } else { " " };
        let dims = option
            .dimensions
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".into());
        println!(
            "{} {:<10} {:<45} dims={:<5} {}",
            marker, option.id, option.model, dims, option.description
        );
    }
    Ok(())
}

fn run_use(cli: &Cli, args: &UseArgs) -> Result<()> {
    let handles = build_environment_with(EnvironmentOptions {
        dataset: None,
        skip_dataset: true,
    })?;
    let summary = remember_dataset(&handles.config, &args.location)?;

    if cli.json {
        return print_json(&summary);
    }
    println!(
        "Default dataset is now {} ({} records, {} questions)",
        summary.source, summary.records, summary.questions
    );
    Ok(())
}

fn print_results(response: &SearchResponse) {
    if response.degraded {
        println!("(embedding unavailable; ranked by keywords only)");
    }
    if response.results.is_empty() {
        println!("No matching answers.");
        return;
    }
    for result in &response.results {
        println!("{}. {}  [{:.3}]", result.rank, result.question, result.score);
        for answer in &result.answers {
            println!("   - {}", answer);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}
