use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trk_cli::{commands, parse_ids, Report, Workspace, LOG_ENV};
use trk_core::EngineConfig;
use trk_manifest::ArtifactId;
use trk_transition::{TransitionCommand, TransitionRequest};

fn fixture_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .short('m')
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Manifest file (.json, .yaml, .yml)"),
        )
        .arg(
            Arg::new("artifacts")
                .long("artifacts")
                .short('a')
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON array of artifact snapshots"),
        )
}

fn request_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("trigger")
                .long("trigger")
                .short('t')
                .help("Trigger name (wins over --to)"),
        )
        .arg(Arg::new("to").long("to").help("Destination state"))
        .arg(
            Arg::new("reason")
                .long("reason")
                .help("State reason; an empty string clears it"),
        )
        .arg(
            Arg::new("resolution")
                .long("resolution")
                .help("Resolution; an empty string clears it"),
        )
        .arg(
            Arg::new("save")
                .long("save")
                .action(ArgAction::SetTrue)
                .help("Write updated artifacts back to the artifacts file"),
        )
}

fn cli() -> Command {
    Command::new("trk")
        .version(trk_core::VERSION)
        .about("Workflow transition engine for project-tracking artifacts")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("check")
                .about("Validate a manifest and summarise its workflows")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Manifest file"),
                ),
        )
        .subcommand(
            fixture_args(Command::new("permitted"))
                .about("List permitted transitions for one artifact")
                .arg(Arg::new("id").long("id").required(true).help("Artifact id")),
        )
        .subcommand(
            request_args(fixture_args(Command::new("transition")))
                .about("Apply one transition")
                .arg(Arg::new("id").long("id").required(true).help("Artifact id"))
                .arg(
                    Arg::new("expected-updated-at")
                        .long("expected-updated-at")
                        .value_parser(value_parser!(DateTime<Utc>))
                        .help("RFC 3339 timestamp the artifact must still carry"),
                ),
        )
        .subcommand(
            request_args(fixture_args(Command::new("batch")))
                .about("Apply one transition to many artifacts")
                .arg(
                    Arg::new("ids")
                        .long("ids")
                        .required(true)
                        .help("Comma-separated artifact ids"),
                ),
        )
        .subcommand(
            fixture_args(Command::new("common"))
                .about("Triggers shared by every selected artifact")
                .arg(
                    Arg::new("ids")
                        .long("ids")
                        .required(true)
                        .help("Comma-separated artifact ids"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<EngineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn open_workspace(args: &ArgMatches, config: EngineConfig) -> anyhow::Result<Workspace> {
    let manifest = args
        .get_one::<PathBuf>("manifest")
        .context("--manifest is required")?;
    let artifacts = args
        .get_one::<PathBuf>("artifacts")
        .context("--artifacts is required")?;
    Workspace::load(manifest, artifacts, config)
}

fn build_request(args: &ArgMatches) -> TransitionRequest {
    let text = |name: &str| args.get_one::<String>(name).cloned();
    TransitionRequest {
        trigger: text("trigger"),
        new_state: text("to").map(Into::into),
        state_reason: text("reason"),
        resolution: text("resolution"),
        expected_updated_at: args
            .try_get_one::<DateTime<Utc>>("expected-updated-at")
            .ok()
            .flatten()
            .copied(),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a String> {
    args.get_one::<String>(name)
        .with_context(|| format!("--{name} is required"))
}

async fn run(matches: ArgMatches) -> anyhow::Result<Report> {
    let config = load_config(&matches)?;
    match matches.subcommand() {
        Some(("check", args)) => {
            let path = args
                .get_one::<PathBuf>("path")
                .context("manifest path is required")?;
            commands::check(path)
        }
        Some(("permitted", args)) => {
            let workspace = open_workspace(args, config)?;
            let id = ArtifactId::new(required(args, "id")?.as_str());
            commands::permitted(&workspace, &id).await
        }
        Some(("transition", args)) => {
            let workspace = open_workspace(args, config)?;
            let command = TransitionCommand::new(
                required(args, "id")?.as_str(),
                build_request(args),
            );
            commands::transition(&workspace, &command, args.get_flag("save")).await
        }
        Some(("batch", args)) => {
            let workspace = open_workspace(args, config)?;
            let ids = parse_ids(required(args, "ids")?);
            commands::batch(&workspace, &ids, &build_request(args), args.get_flag("save")).await
        }
        Some(("common", args)) => {
            let workspace = open_workspace(args, config)?;
            let ids = parse_ids(required(args, "ids")?);
            commands::common(&workspace, &ids).await
        }
        _ => anyhow::bail!("unknown subcommand"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let report = run(matches).await?;
    println!("{}", serde_json::to_string_pretty(&report.body)?);
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
