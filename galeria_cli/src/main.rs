mod charts;
mod client;
mod watch;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use galeria::{comparison_charts, ChartBundle, ClientConfig, ParamForm, SubmitOutcome};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::charts::{extract_chart_json, render_charts, ImageFormat};
use crate::client::ApiClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Gallery optimization client", long_about = None)]
struct Cli {
    /// Server root, e.g. http://127.0.0.1:5000
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// JSON client configuration (poll interval, error cap, ...)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start processing every gallery and follow the run until it finishes
    Submit(SubmitArgs),
    /// Follow a run that is already executing
    Watch(WatchArgs),
    /// Check a parameter file without contacting the server
    Validate(ValidateArgs),
    /// Draw the comparison charts from results data
    Charts(ChartsArgs),
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// Parameter JSON (weights + 7 gallery slots); sent as the form body
    #[arg(long, value_hint = ValueHint::FilePath)]
    params: Option<PathBuf>,

    /// CSRF token forwarded in the X-CSRFToken header
    #[arg(long)]
    csrf_token: Option<String>,

    /// Session cookie header value, e.g. `session=abc`
    #[arg(long)]
    cookie: Option<String>,

    /// Print the thread id and exit instead of watching
    #[arg(long, action = ArgAction::SetTrue)]
    no_watch: bool,
}

#[derive(Parser, Debug)]
struct WatchArgs {
    /// Background thread id returned at submission
    thread_id: String,

    /// Run id appended to the results URL
    #[arg(long)]
    run_id: Option<String>,

    /// Session cookie header value
    #[arg(long)]
    cookie: Option<String>,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Parameter JSON to check
    #[arg(long, value_hint = ValueHint::FilePath)]
    params: PathBuf,
}

#[derive(Parser, Debug)]
struct ChartsArgs {
    /// Chart data: plain JSON or a saved results page embedding it
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output PNG path (defaults next to the input)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = load_config(cli.config.as_deref(), cli.base_url)?;
    match cli.command {
        Command::Submit(args) => handle_submit(&config, args).await,
        Command::Watch(args) => handle_watch(&config, args).await,
        Command::Validate(args) => handle_validate(args),
        Command::Charts(args) => handle_charts(args),
    }
}

fn load_config(path: Option<&Path>, base_url: Option<String>) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ClientConfig::from_json_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => ClientConfig::default(),
    };
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    Ok(config)
}

fn load_params(path: &Path) -> Result<ParamForm> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid parameters {}", path.display()))
}

async fn handle_submit(config: &ClientConfig, args: SubmitArgs) -> Result<()> {
    let form = match &args.params {
        Some(path) => {
            let params = load_params(path)?;
            params.validate()?;
            params.to_form_pairs()
        }
        None => Vec::new(),
    };

    let client = ApiClient::new(config, args.cookie.as_deref())?;
    info!(url = %client.url(galeria::routes::SUBMIT_PATH), fields = form.len(), "submitting run");
    let response = client.submit(&form, args.csrf_token.as_deref()).await?;

    match response.outcome() {
        SubmitOutcome::Rejected { message } => bail!(message),
        SubmitOutcome::Completed { results_url } => {
            println!("{}", client.url(&results_url));
        }
        SubmitOutcome::Started(job) => {
            info!(thread_id = %job.thread_id, run_id = ?job.run_id, "run started");
            if args.no_watch {
                println!("{}", job.thread_id);
            } else {
                let url =
                    watch::watch(&client, config, &job.thread_id, job.run_id.as_deref()).await?;
                println!("{url}");
            }
        }
        SubmitOutcome::Untracked => {
            warn!("server accepted the run without a thread id; nothing to follow");
        }
    }
    Ok(())
}

async fn handle_watch(config: &ClientConfig, args: WatchArgs) -> Result<()> {
    let client = ApiClient::new(config, args.cookie.as_deref())?;
    let run_id = args.run_id.as_deref().filter(|r| !r.is_empty());
    let url = watch::watch(&client, config, &args.thread_id, run_id).await?;
    println!("{url}");
    Ok(())
}

fn handle_validate(args: ValidateArgs) -> Result<()> {
    let params = load_params(&args.params)?;
    params.validate()?;
    println!("ok");
    Ok(())
}

fn handle_charts(args: ChartsArgs) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let bundle = ChartBundle::from_json(extract_chart_json(&text))?;
    let unknown = bundle.unknown_keys();
    if !unknown.is_empty() {
        warn!(keys = ?unknown, "ignoring unrecognised series");
    }
    let specs = comparison_charts(&bundle)?;

    let mut targets = Vec::new();
    if let Some(png) = args.png {
        targets.push((png, ImageFormat::Png));
    }
    if let Some(svg) = args.svg {
        targets.push((svg, ImageFormat::Svg));
    }
    if targets.is_empty() {
        targets.push((args.input.with_extension("png"), ImageFormat::Png));
    }

    for (path, format) in targets {
        render_charts(&specs, &path, format)?;
        info!(charts = specs.len(), "wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn params_file_round_trips_into_form_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"weights": {{"social": 40, "economic": "30", "municipal": 30}},
                "slots": [{{"lot_size": 10, "primary_count": 2, "secondary_count": 1}}]}}"#
        )
        .unwrap();
        let params = load_params(file.path()).unwrap();
        assert_eq!(params.weights.total(), Some(100));
        let pairs = params.to_form_pairs();
        assert!(pairs.contains(&("peso_bs".to_string(), "40".to_string())));
        assert!(pairs.contains(&("tam_lote_1".to_string(), "10".to_string())));
        assert!(params.validate().is_err());
    }

    #[test]
    fn unreadable_params_name_the_file() {
        let err = load_params(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/params.json"));
    }

    #[test]
    fn base_url_flag_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_url": "http://example.test", "poll_interval_ms": 250}}"#).unwrap();
        let config = load_config(Some(file.path()), None).unwrap();
        assert_eq!(config.base_url, "http://example.test");
        assert_eq!(config.poll_interval_ms, 250);

        let config =
            load_config(Some(file.path()), Some("http://other.test".to_string())).unwrap();
        assert_eq!(config.base_url, "http://other.test");
    }

    #[test]
    fn rejects_zero_poll_interval_in_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"poll_interval_ms": 0}}"#).unwrap();
        assert!(load_config(Some(file.path()), None).is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "galeria",
            "watch",
            "t-1",
            "--run-id",
            "r-9",
            "--base-url",
            "http://h:1",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://h:1"));
        match cli.command {
            Command::Watch(args) => {
                assert_eq!(args.thread_id, "t-1");
                assert_eq!(args.run_id.as_deref(), Some("r-9"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
