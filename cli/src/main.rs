//! nopii CLI - PDF personal information redaction tool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use nopii::{EntityRecognizer, LexiconModel, Page, PageLayoutExtractor, Pipeline, RedactOptions};

#[derive(Parser)]
#[command(name = "nopii")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Detect and redact personal information in PDF documents", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output PDF file
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Redact personal information and write a new PDF
    Redact {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to <stem>_redacted.pdf)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// JSON options file
        #[arg(long, value_name = "JSON", env = "NOPII_CONFIG")]
        config: Option<PathBuf>,

        /// Entity model file (defaults to the builtin lexicon)
        #[arg(long, value_name = "JSON", env = "NOPII_MODEL")]
        model: Option<PathBuf>,

        /// Write the audit report to this file
        #[arg(long, value_name = "JSON")]
        report: Option<PathBuf>,

        /// Process pages one at a time
        #[arg(long)]
        sequential: bool,

        /// Only paint boxes; keep the covered text in the content stream
        #[arg(long)]
        keep_text: bool,
    },

    /// List detected personal information without writing anything
    Scan {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// JSON options file
        #[arg(long, value_name = "JSON", env = "NOPII_CONFIG")]
        config: Option<PathBuf>,

        /// Entity model file (defaults to the builtin lexicon)
        #[arg(long, value_name = "JSON", env = "NOPII_MODEL")]
        model: Option<PathBuf>,
    },

    /// Print the extracted text of each page
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only this page (1-based)
        #[arg(long)]
        page: Option<usize>,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Redact {
            input,
            output,
            config,
            model,
            report,
            sequential,
            keep_text,
        }) => cmd_redact(
            &input,
            output.as_deref(),
            config.as_deref(),
            model.as_deref(),
            report.as_deref(),
            sequential,
            keep_text,
        ),
        Some(Commands::Scan {
            input,
            config,
            model,
        }) => cmd_scan(&input, config.as_deref(), model.as_deref()),
        Some(Commands::Text { input, page }) => cmd_text(&input, page),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: redact if input is provided
            if let Some(input) = cli.input {
                cmd_redact(&input, cli.output.as_deref(), None, None, None, false, false)
            } else {
                println!("{}", "Usage: nopii <FILE> [OUTPUT]".yellow());
                println!("       nopii --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{} [{}]: {}", "Error".red().bold(), e.kind(), e);
        std::process::exit(1);
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{}_redacted.pdf", stem))
}

fn load_options(config: Option<&Path>) -> nopii::Result<RedactOptions> {
    match config {
        Some(path) => RedactOptions::from_json_file(path),
        None => Ok(RedactOptions::default()),
    }
}

fn build_pipeline(options: RedactOptions, model: Option<&Path>) -> nopii::Result<Pipeline> {
    let model = match model {
        Some(path) => Arc::new(LexiconModel::from_file(path)?),
        None => LexiconModel::shared()?,
    };
    Pipeline::new(options, model)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}

fn cmd_redact(
    input: &Path,
    output: Option<&Path>,
    config: Option<&Path>,
    model: Option<&Path>,
    report_path: Option<&Path>,
    sequential: bool,
    keep_text: bool,
) -> nopii::Result<()> {
    let mut options = load_options(config)?;
    if sequential {
        options = options.sequential();
    }
    if keep_text {
        options = options.keep_text();
    }
    log::debug!("Options: {:?}", options);

    let pb = spinner("Loading model...");
    let pipeline = build_pipeline(options, model)?;

    pb.set_message("Redacting...");
    let data = fs::read(input)?;
    let result = pipeline.redact(&data);
    pb.finish_and_clear();
    let result = result?;

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| default_output_path(input));
    fs::write(&output, &result.pdf)?;

    if let Some(path) = report_path {
        fs::write(path, result.report.to_json_pretty()?)?;
    }

    let totals = &result.report.totals;
    println!("{} {}", "Saved to".green(), output.display());
    println!(
        "  {} spans, {} boxes on {} of {} pages",
        totals.spans, totals.boxes, totals.pages_modified, result.report.page_count
    );
    if totals.unmapped > 0 {
        println!(
            "  {} {} spans could not be located on the page",
            "Warning:".yellow().bold(),
            totals.unmapped
        );
    }
    Ok(())
}

fn cmd_scan(input: &Path, config: Option<&Path>, model: Option<&Path>) -> nopii::Result<()> {
    let pipeline = build_pipeline(load_options(config)?, model)?;
    let data = fs::read(input)?;
    let analysis = pipeline.analyze(&data)?;

    for page in &analysis.pages {
        if page.spans.is_empty() {
            continue;
        }
        let text = analysis
            .document
            .get_page(page.index)
            .map(|p| p.text())
            .unwrap_or_default();
        println!("{} {}", "Page".cyan().bold(), page.index + 1);
        for span in &page.spans {
            println!(
                "  {:>6}..{:<6} {:<14} {:<8} {}",
                span.start,
                span.end,
                span.category.to_string(),
                span.source.to_string().dimmed(),
                span.slice(text).unwrap_or_default()
            );
        }
    }

    println!(
        "\n{} {} spans on {} pages",
        "Found".green().bold(),
        analysis.span_count(),
        analysis.document.page_count()
    );
    if analysis.unmapped_count() > 0 {
        println!("{} {} unmapped spans", "Warning:".yellow().bold(), analysis.unmapped_count());
    }
    Ok(())
}

fn cmd_text(input: &Path, page: Option<usize>) -> nopii::Result<()> {
    let data = fs::read(input)?;
    let doc = PageLayoutExtractor::default().extract(&data)?;

    for p in &doc.pages {
        if page.is_some_and(|n| n != p.index + 1) {
            continue;
        }
        println!("{}", page_header(p).dimmed());
        println!("{}", p.text());
    }
    Ok(())
}

fn page_header(page: &Page) -> String {
    let (width, height) = page.dimensions();
    format!("── Page {} ({:.0} x {:.0} pt) ──", page.index + 1, width, height)
}

fn model_summary(model: &LexiconModel) -> String {
    format!("{} {} ({})", model.name(), model.version(), model.language())
}

fn cmd_version() {
    println!("{} {}", "nopii".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF personal information redaction tool");
    println!();
    match LexiconModel::shared() {
        Ok(model) => println!("Entity model: {}", model_summary(&model)),
        Err(e) => println!("Entity model: {}", e.to_string().red()),
    }
    println!("Repository: {}", "https://github.com/iyulab/nopii".dimmed());
    println!("License: MIT");
}
