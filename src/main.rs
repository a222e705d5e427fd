use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use erd_pets::diagram::{self, DiagramFile};
use erd_pets::ir::{DetailLevel, DiagramView};
use erd_pets::sql;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "erd-pets", about = "Resolve an ER diagram against a SQL schema")]
#[command(version)]
struct Cli {
    /// SQL DDL file
    schema: PathBuf,

    /// Diagram file (`*.erd-pets.json`); every table is shown without one
    #[arg(short, long)]
    diagram: Option<PathBuf>,

    /// Diagram id to resolve (default: the first diagram)
    #[arg(short, long)]
    view: Option<String>,

    /// Detail level: tables, pk, pk_fk, all
    #[arg(long, default_value = "all", value_parser = parse_detail)]
    detail: DetailLevel,

    /// Write resolved positions back into the diagram file
    #[arg(short, long, requires = "diagram")]
    write: bool,
}

fn parse_detail(s: &str) -> Result<DetailLevel, String> {
    DetailLevel::from_str(s).ok_or_else(|| format!("invalid detail level: {}", s))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let sql_text = std::fs::read_to_string(&cli.schema)
        .with_context(|| format!("Failed to read schema file: {}", cli.schema.display()))?;
    let schema = sql::parse(&sql_text);
    for d in &schema.diagnostics {
        eprintln!("{}: {}", cli.schema.display(), d);
    }

    let file = match &cli.diagram {
        Some(path) => {
            if !path.to_string_lossy().ends_with(diagram::FILE_EXTENSION) {
                tracing::warn!(path = %path.display(), "diagram file name does not end in {}", diagram::FILE_EXTENSION);
            }
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read diagram file: {}", path.display()))?;
            let parsed = diagram::parse(&text);
            for e in &parsed.errors {
                eprintln!("{}: {}", path.display(), e);
            }
            match parsed.data {
                Some(file) => file,
                None => bail!("Invalid diagram file: {}", path.display()),
            }
        }
        None => DiagramFile::new(cli.schema.display().to_string()),
    };

    let selected = match &cli.view {
        Some(id) => file
            .diagram(id)
            .with_context(|| format!("Diagram \"{}\" not found", id))?,
        None => file.diagrams.first().context("Diagram file has no diagrams")?,
    };

    let view = DiagramView::build(&schema, selected, None, cli.detail);
    for e in &view.errors {
        eprintln!("{}: {}", selected.id, e);
    }
    println!("{}", serde_json::to_string_pretty(&view)?);

    if let (true, Some(path)) = (cli.write, &cli.diagram) {
        let positions: HashMap<String, _> = view
            .tables
            .iter()
            .map(|t| (t.qualified_name.clone(), diagram::Position::new(t.x, t.y)))
            .collect();
        let text = diagram::serialize(&file, &selected.id, &positions, &schema.tables)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write diagram file: {}", path.display()))?;
    }

    Ok(())
}
