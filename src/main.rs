use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use overlay_pages::{Config, MeasureKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

const INPUT_CANDIDATES: &[&str] = &["content.txt", "content.md"];
const TEMPLATE_CANDIDATES: &[&str] = &["Template.pdf", "template.pdf"];

#[derive(Parser)]
#[command(name = "overlay-pages")]
#[command(about = "Lay out a text file onto pages over a PDF template")]
struct Cli {
    /// Text file with the content to lay out
    #[arg(long, default_value = "content.txt")]
    input: PathBuf,

    /// Background template; its first page is used behind every output page
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output file [default: output.pdf, or output.typ with --typst]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file, ignored if missing
    #[arg(long, default_value = "overlay.toml")]
    config: PathBuf,

    /// Left margin (pt)
    #[arg(long)]
    left: Option<f64>,

    /// Right margin (pt)
    #[arg(long)]
    right: Option<f64>,

    /// Top margin (pt)
    #[arg(long)]
    top: Option<f64>,

    /// Bottom margin (pt)
    #[arg(long)]
    bottom: Option<f64>,

    /// Body font size (pt)
    #[arg(long)]
    font_size: Option<f64>,

    /// Level-1 heading size (pt)
    #[arg(long)]
    h1_size: Option<f64>,

    /// Level-2 heading size (pt)
    #[arg(long)]
    h2_size: Option<f64>,

    /// How block heights are measured
    #[arg(long, value_enum, default_value_t = MeasureArg::Typst)]
    measure: MeasureArg,

    /// Write the generated Typst source instead of a PDF
    #[arg(long)]
    typst: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MeasureArg {
    Typst,
    Estimate,
}

impl From<MeasureArg> for MeasureKind {
    fn from(arg: MeasureArg) -> Self {
        match arg {
            MeasureArg::Typst => MeasureKind::Typst,
            MeasureArg::Estimate => MeasureKind::Estimate,
        }
    }
}

impl Cli {
    fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None if self.typst => PathBuf::from("output.typ"),
            None => PathBuf::from("output.pdf"),
        }
    }

    fn apply_overrides(&self, config: &mut Config) {
        let overrides = [
            (self.left, &mut config.page.left),
            (self.right, &mut config.page.right),
            (self.top, &mut config.page.top),
            (self.bottom, &mut config.page.bottom),
            (self.font_size, &mut config.font.body_size),
            (self.h1_size, &mut config.font.h1_size),
            (self.h2_size, &mut config.font.h2_size),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

/// First existing path among `preferred` and the fallback names.
fn resolve_path(preferred: &Path, candidates: &[&str]) -> Option<PathBuf> {
    std::iter::once(preferred.to_path_buf())
        .chain(candidates.iter().map(PathBuf::from))
        .find(|path| path.is_file())
}

fn tried(preferred: &Path, candidates: &[&str]) -> String {
    std::iter::once(preferred.display().to_string())
        .chain(candidates.iter().map(|c| c.to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), default))
        }))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    cli.apply_overrides(&mut config);

    let template = match &cli.template {
        Some(path) if !path.is_file() => bail!("Template not found: {}", path.display()),
        Some(path) => Some(path.clone()),
        None => {
            let found = TEMPLATE_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|path| path.is_file());
            if found.is_none() {
                info!("no template found, rendering on plain pages");
            }
            found
        }
    };

    let Some(input) = resolve_path(&cli.input, INPUT_CANDIDATES) else {
        bail!(
            "Input content not found. Tried: {}",
            tried(&cli.input, INPUT_CANDIDATES)
        );
    };
    let text = fs::read_to_string(&input)
        .with_context(|| format!("Error reading {}", input.display()))?;
    let output = cli.output_path();

    if cli.typst {
        let markup = overlay_pages::text_to_typst(
            &text,
            &config,
            template.as_deref(),
            cli.measure.into(),
        )?;
        fs::write(&output, markup)
            .with_context(|| format!("Error writing {}", output.display()))?;
        println!("Wrote Typst source to {}", output.display());
        return Ok(());
    }

    let pdf = overlay_pages::text_to_pdf(
        &text,
        &config,
        template.as_deref(),
        cli.measure.into(),
    )?;
    fs::write(&output, &pdf.bytes)
        .with_context(|| format!("Error writing {}", output.display()))?;

    println!("Wrote {} page(s) to {}", pdf.pages, output.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let argv = std::iter::once("overlay-pages").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn output_defaults_follow_format() {
        assert_eq!(cli(&[]).output_path(), PathBuf::from("output.pdf"));
        assert_eq!(cli(&["--typst"]).output_path(), PathBuf::from("output.typ"));
        assert_eq!(
            cli(&["--typst", "-o", "notes.typ"]).output_path(),
            PathBuf::from("notes.typ")
        );
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        cli(&["--left", "20", "--font-size", "11"]).apply_overrides(&mut config);
        assert_eq!(config.page.left, 20.0);
        assert_eq!(config.font.body_size, 11.0);
        assert_eq!(config.page.right, 50.0);
    }
}
