//! casc - merge YAML configuration sources and print the result

use anyhow::{Context, Result, anyhow};
use casc_config::{ConfigurationContext, SourceReader, YamlSource, merge, provenance, render_provenance};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yaml_rust2::YamlEmitter;

#[derive(Parser, Debug)]
#[command(name = "casc")]
#[command(version)]
#[command(about = "Merge YAML configuration sources into one document", long_about = None)]
struct Cli {
    /// Sources to merge, in order: file paths, http(s) or file URLs, or '-' for stdin
    #[arg(required = true)]
    sources: Vec<String>,

    /// Merge strategy: errorOnConflict, override or append
    #[arg(short, long)]
    strategy: Option<String>,

    /// Maximum number of aliases for sequences and mappings per document
    #[arg(long)]
    max_aliases: Option<usize>,

    /// Print where each value came from instead of the merged document
    #[arg(long)]
    provenance: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => print!("{output}"),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    let mut context = ConfigurationContext::from_env();
    if let Some(strategy) = &cli.strategy {
        context = context.with_merge_strategy(strategy.clone());
    }
    if let Some(max) = cli.max_aliases {
        context = context.with_max_aliases(max);
    }

    let sources = cli.sources.iter().map(|arg| source_from_arg(arg)).collect();
    let merged = merge(sources, &context, &SourceReader::new())?;

    let Some(root) = merged else {
        tracing::warn!("yaml source returned an empty document");
        return Ok(if cli.provenance { String::new() } else { "{}\n".to_string() });
    };

    if cli.provenance {
        return Ok(render_provenance(&provenance(&root)));
    }

    let mut out = String::new();
    YamlEmitter::new(&mut out)
        .dump(&root.to_yaml())
        .map_err(|e| anyhow!("{e:?}"))
        .context("Failed to emit merged YAML")?;
    out.push('\n');
    Ok(out)
}

fn source_from_arg(arg: &str) -> YamlSource {
    if arg == "-" {
        YamlSource::stream("stdin", std::io::stdin())
    } else if arg.contains("://") {
        YamlSource::url(arg)
    } else {
        YamlSource::path(arg)
    }
}
