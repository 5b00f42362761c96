//! `ui-verify` - run the report-flow smoke verification
//!
//! With no arguments this drives `http://localhost:5173` exactly as the
//! built-in flow describes and exits 0 once the run completes, even if checks
//! failed. Use `--strict` to turn failed checks into exit status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use civic_ui_verify::config::Browser;
use civic_ui_verify::{OutputFormat, Scenario, Verifier, VerifierConfig};

#[derive(Parser, Debug)]
#[command(name = "ui-verify")]
#[command(about = "Smoke-verify the civic report UI with Playwright")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); missing file means defaults
    #[arg(short, long, default_value = "ui-verify.toml")]
    config: PathBuf,

    /// Base URL of the running front-end
    #[arg(long)]
    app_url: Option<String>,

    /// Output directory for screenshots and the report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run a YAML scenario instead of the built-in report flow
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Summary format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Remove the upload image after the run
    #[arg(long)]
    cleanup_upload: bool,

    /// Compare screenshots against baselines in this directory
    #[arg(long)]
    baseline_dir: Option<PathBuf>,

    /// Copy this run's screenshots into the baseline directory
    #[arg(long)]
    update_baselines: bool,

    /// Exit with status 1 when any check fails
    #[arg(long)]
    strict: bool,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    init_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn apply(&self, mut config: VerifierConfig) -> VerifierConfig {
        if let Some(url) = &self.app_url {
            config.app_url = url.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if self.headed {
            config.headless = false;
        }
        if self.cleanup_upload {
            config.cleanup_upload = true;
        }
        if let Some(dir) = &self.baseline_dir {
            config.baseline_dir = Some(dir.clone());
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = args.apply(VerifierConfig::load(&args.config)?);

    if args.init_config {
        config.save(&args.config)?;
        info!("Configuration written to {}", args.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    info!("Verifying {} (output: {})", config.app_url, config.output_dir.display());

    // Keep stdout parseable for machine-readable summaries
    let echo = matches!(args.format, OutputFormat::Table | OutputFormat::Plain);
    let verifier = match &args.scenario {
        Some(path) => Verifier::with_scenario(config, Scenario::from_file(path)?)?,
        None => Verifier::new(config)?,
    }
    .echo(echo);

    let report = verifier.run().await?;
    civic_ui_verify::report::print_summary(&report, args.format);

    if args.update_baselines {
        let updated = verifier.update_baselines(&report)?;
        info!("Updated {} baseline(s)", updated);
    }

    Ok(ExitCode::from(report.exit_status(args.strict)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_keeps_defaults() {
        let args = Args::parse_from(["ui-verify"]);
        assert_eq!(args.apply(VerifierConfig::default()), VerifierConfig::default());
        assert!(!args.strict);
        assert_eq!(args.format, OutputFormat::Table);
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "ui-verify",
            "--app-url",
            "http://127.0.0.1:4173",
            "--browser",
            "firefox",
            "--headed",
            "--cleanup-upload",
        ]);
        let config = args.apply(VerifierConfig::default());
        assert_eq!(config.app_url, "http://127.0.0.1:4173");
        assert_eq!(config.browser, Browser::Firefox);
        assert!(!config.headless);
        assert!(config.cleanup_upload);
    }

    #[test]
    fn test_update_baselines_uses_configured_dir() {
        let args = Args::parse_from(["ui-verify", "--update-baselines"]);
        assert!(args.update_baselines);

        let config = args.apply(VerifierConfig {
            baseline_dir: Some(PathBuf::from("baselines")),
            ..Default::default()
        });
        assert_eq!(config.baseline_dir, Some(PathBuf::from("baselines")));
    }
}
