//! Document Translator CLI - translate or summarize a document from the command line.

use anyhow::{Context, Result, bail};
use clap::Parser;
use doc_translator_core::{
    AppConfig, Language, SourceFormat, Workflow, create_gateway, target_languages,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "doc-translate")]
#[command(author, version, about = "Translate or summarize PDF, Markdown and text documents", long_about = None)]
struct Args {
    /// Input document (.pdf, .md or .txt)
    #[arg(required_unless_present = "list_languages")]
    input: Option<PathBuf>,

    /// Target language (default: from config, else French)
    #[arg(short, long)]
    language: Option<String>,

    /// Summarize first, then translate the summary
    #[arg(short, long)]
    summarize: bool,

    /// Output file (default: next to the input, named after the result)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the extracted text and exit
    #[arg(long)]
    extract_only: bool,

    /// Override the MIME type guessed from the file extension
    #[arg(long)]
    mime: Option<String>,

    /// TrueType font for text Helvetica cannot encode (repeatable, tried in order)
    #[arg(long = "font", value_name = "TTF")]
    fonts: Vec<PathBuf>,

    /// List the offered target languages and exit
    #[arg(long)]
    list_languages: bool,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name for OpenAI-compatible API
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// MIME type for `path`, from its extension
fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Where to write the result when `-o` is not given
fn default_output(input: &Path, filename: &str) -> PathBuf {
    input.with_file_name(filename)
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if args.list_languages {
        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        for language in target_languages() {
            println!("{language}");
        }
        return Ok(());
    }

    let Some(input) = args.input.as_deref() else {
        bail!("No input document given");
    };

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(api_base) = args.api_base {
        config.gateway.api_base = api_base;
    }
    if args.api_key.is_some() {
        config.gateway.api_key = args.api_key;
    }
    if let Some(model) = args.model {
        config.gateway.model = model;
    }
    // Fonts given on the command line are tried before configured ones
    let mut fonts = args.fonts;
    fonts.append(&mut config.pdf.fonts);
    config.pdf.fonts = fonts;
    config.validate().context("Invalid configuration")?;

    let target = args
        .language
        .map_or_else(|| config.default_target_language.clone(), Language::new);

    let mime = args.mime.unwrap_or_else(|| guess_mime(input));
    let format = SourceFormat::from_mime(&mime)
        .with_context(|| format!("Cannot handle {} ({mime})", input.display()))?;

    info!("Loading {}: {}", format, input.display());
    let bytes = std::fs::read(input).context(format!("Failed to read {}", input.display()))?;

    let gateway = create_gateway(&config.gateway).context("Failed to initialize gateway")?;
    let mut workflow = Workflow::new(gateway, config.pdf);

    let pb = spinner();
    pb.set_message(format!("Extracting text from {}", input.display()));
    let loaded = workflow
        .upload(bytes, format.mime())
        .await
        .context(format!("Failed to extract text from {}", input.display()))?;

    if args.extract_only {
        pb.finish_and_clear();
        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        {
            println!("{}", loaded.content);
        }
        return Ok(());
    }

    let translated = if args.summarize {
        pb.set_message("Summarizing");
        workflow.summarize().await.context("Failed to summarize")?;
        pb.set_message(format!("Translating summary to {target}"));
        workflow
            .translate_summary(&target)
            .await
            .context("Failed to translate summary")?
    } else {
        pb.set_message(format!("Translating to {target}"));
        workflow
            .translate_full(&target)
            .await
            .context("Failed to translate document")?
    };
    pb.finish_with_message("Done");

    let output_path = args
        .output
        .unwrap_or_else(|| default_output(input, &translated.filename));

    std::fs::write(&output_path, translated.bytes())
        .context(format!("Failed to write output: {}", output_path.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Saved {} to: {}", translated.kind, output_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a/report.pdf")), "application/pdf");
        assert_eq!(guess_mime(Path::new("notes.md")), "text/markdown");
        assert_eq!(guess_mime(Path::new("notes.txt")), "text/plain");
        assert_eq!(guess_mime(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("docs/report.pdf"), "translated_content.pdf"),
            PathBuf::from("docs/translated_content.pdf")
        );
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["doc-translate", "in.md", "-l", "Hindi", "--summarize"])
            .map_err(|e| e.to_string());
        let Ok(args) = args else {
            panic!("parse failed: {args:?}");
        };
        assert_eq!(args.language.as_deref(), Some("Hindi"));
        assert!(args.summarize);

        let args = Args::try_parse_from(["doc-translate", "in.pdf", "--font", "a.ttf", "--font", "b.ttf"]);
        assert!(args.is_ok_and(|a| a.fonts == [PathBuf::from("a.ttf"), PathBuf::from("b.ttf")]));

        assert!(Args::try_parse_from(["doc-translate"]).is_err());
        assert!(Args::try_parse_from(["doc-translate", "--list-languages"]).is_ok());
    }
}
