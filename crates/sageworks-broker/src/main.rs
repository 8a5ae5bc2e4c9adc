use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sageworks_broker::{connectors, BrokerConfig, Category, MetadataBroker};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("sageworks-broker")
        .version(sageworks_broker::VERSION)
        .about("Inspect SageWorks metadata through the caching broker")
        .arg(
            Arg::new("root")
                .long("root")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the local mirror (<root>/<bucket>/<category>/)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Broker config file (defaults to $SAGEWORKS_CONFIG_FILE)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("get")
                .about("Print the metadata for one category")
                .arg(
                    Arg::new("category")
                        .required(true)
                        .value_parser(value_parser!(Category))
                        .help("Category name, e.g. models or data_sources_s3"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Refresh even if cached metadata is fresh"),
                ),
        )
        .subcommand(
            Command::new("all")
                .about("Summarize the metadata for every category")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Refresh every category"),
                ),
        )
        .subcommand(
            Command::new("sizes")
                .about("Sum object sizes under a prefix")
                .arg(
                    Arg::new("category")
                        .required(true)
                        .value_parser(value_parser!(Category)),
                )
                .arg(
                    Arg::new("prefix")
                        .long("prefix")
                        .default_value("")
                        .help("Only count objects under this prefix"),
                ),
        )
        .subcommand(Command::new("check").about("Probe every connector"))
}

fn init_logging(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if matches.get_flag("json-logs") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_logging(&matches);

    let config = BrokerConfig::resolve(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("loading broker config")?;
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let broker = MetadataBroker::new(&config, connectors::local_mirror(&root, &config))
        .context("creating metadata broker")?;

    match matches.subcommand() {
        Some(("get", args)) => {
            let category = *args
                .get_one::<Category>("category")
                .context("category is required")?;
            let snapshot = broker
                .get_metadata(category, args.get_flag("force"))
                .await?;
            println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        }
        Some(("all", args)) => {
            let all = broker.get_all_metadata(args.get_flag("force")).await;
            for (category, snapshot) in &all.snapshots {
                println!(
                    "{category:<18} {:>6} entries  (generation {})",
                    snapshot.len(),
                    snapshot.generation()
                );
            }
            for (category, error) in &all.errors {
                println!("{category:<18} ERROR  {error}");
            }
        }
        Some(("sizes", args)) => {
            let category = *args
                .get_one::<Category>("category")
                .context("category is required")?;
            let prefix = args.get_one::<String>("prefix").map_or("", String::as_str);
            let total = broker.object_sizes(category, prefix).await?;
            println!("{category} {prefix:?}: {total} bytes");
        }
        Some(("check", _)) => {
            for (category, ok) in broker.check_connectors().await {
                println!("{category:<18} {}", if ok { "OK" } else { "UNREACHABLE" });
            }
        }
        _ => {}
    }

    broker.wait_for_refreshes().await;
    Ok(())
}
