use anyhow::{bail, Context, Result};
use billsync_cli::partitions::{describe_catalog, resolve};
use billsync_aggregate::{DateRange, QuickFilter, RecordFilter};
use billsync_cli::{build_report, load_rows, logging, run_simulator, AppConfig, ReportFilter, SimulatorConfig};
use billsync_partition::{PartitionName, Principal, Role};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;

fn cli() -> Command {
    Command::new("billsync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Billing replica tools")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("report")
                .about("Aggregate an exported partition")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of raw rows"),
                )
                .arg(
                    Arg::new("as-of")
                        .long("as-of")
                        .help("RFC 3339 timestamp to aggregate at (defaults to now)"),
                )
                .arg(
                    Arg::new("quick")
                        .long("quick")
                        .default_value("all")
                        .value_parser(["all", "paid", "transfer", "unpaid"])
                        .help("Dashboard tab to aggregate"),
                )
                .arg(
                    Arg::new("name")
                        .long("name")
                        .help("Only records whose name contains this text"),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_parser(value_parser!(NaiveDate))
                        .help("Only records created on or after this day (YYYY-MM-DD)"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_parser(value_parser!(NaiveDate))
                        .help("Only records created on or before this day (YYYY-MM-DD)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the replica simulator")
                .arg(
                    Arg::new("operations")
                        .long("operations")
                        .default_value("500")
                        .value_parser(value_parser!(u64))
                        .help("Number of operations to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("partitions")
                        .long("partitions")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Number of catalog partitions to use"),
                )
                .arg(
                    Arg::new("settle-secs")
                        .long("settle-secs")
                        .default_value("5")
                        .value_parser(value_parser!(u64))
                        .help("Seconds a convergence check may wait"),
                ),
        )
        .subcommand(
            Command::new("partitions")
                .about("List the catalog and resolve a principal against it")
                .arg(
                    Arg::new("role")
                        .long("role")
                        .default_value("admin")
                        .value_parser(["admin", "employee"])
                        .help("Role of the principal to resolve"),
                )
                .arg(
                    Arg::new("id")
                        .long("id")
                        .default_value("cli")
                        .help("Principal identifier"),
                )
                .arg(
                    Arg::new("assigned")
                        .long("assigned")
                        .help("Partition assigned to the principal"),
                )
                .arg(
                    Arg::new("select")
                        .long("select")
                        .help("Partition to select before resolving"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("log-json"))?;
    let config = AppConfig::load_or_default(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("report", args)) => report(&config, args),
        Some(("simulate", args)) => {
            let passed = simulate(args).await?;
            std::process::exit(if passed { 0 } else { 1 });
        }
        Some(("partitions", args)) => partitions(&config, args),
        Some((other, _)) => bail!("unknown subcommand {other}"),
        None => bail!("no subcommand given"),
    }
}

fn report(config: &AppConfig, args: &ArgMatches) -> Result<()> {
    let input = args.get_one::<PathBuf>("input").context("--input is required")?;
    let offset = config.offset()?;
    let now = match args.get_one::<String>("as-of") {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("--as-of {text} is not RFC 3339"))?
            .with_timezone(&offset),
        None => Utc::now().with_timezone(&offset),
    };

    let quick = match args.get_one::<String>("quick").map(String::as_str) {
        Some("paid") => QuickFilter::Paid,
        Some("transfer") => QuickFilter::Transfer,
        Some("unpaid") => QuickFilter::Unpaid,
        _ => QuickFilter::All,
    };
    let mut records = RecordFilter::new();
    if let Some(name) = args.get_one::<String>("name") {
        records = records.with_name(name.as_str());
    }
    let mut filter = ReportFilter::default().with_quick(quick);
    let from = args.get_one::<NaiveDate>("from").copied();
    let to = args.get_one::<NaiveDate>("to").copied();
    if from.is_some() || to.is_some() {
        let range = DateRange::days(from, to, &offset);
        records = records.with_created(range);
        filter = filter.with_payments(range);
    }

    let rows = load_rows(input)?;
    let report = build_report(&rows, now, &filter.with_records(records));
    if args.get_flag("json") {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.generate_text());
    }
    Ok(())
}

async fn simulate(args: &ArgMatches) -> Result<bool> {
    let config = SimulatorConfig {
        seed: args.get_one::<u64>("seed").copied().context("--seed")?,
        operations: args.get_one::<u64>("operations").copied().context("--operations")?,
        partitions: args.get_one::<usize>("partitions").copied().context("--partitions")?,
        settle_timeout: Duration::from_secs(args.get_one::<u64>("settle-secs").copied().context("--settle-secs")?),
        ..SimulatorConfig::default()
    };

    println!("Running billsync simulator...");
    println!("Operations: {}", config.operations);
    println!("Seed: {}", config.seed);
    println!();

    let report = run_simulator(config).await;
    println!("{}", report.generate_text());
    Ok(report.passed())
}

fn partitions(config: &AppConfig, args: &ArgMatches) -> Result<()> {
    let id = args.get_one::<String>("id").context("--id")?;
    let assigned = args
        .get_one::<String>("assigned")
        .map(|name| PartitionName::new(name.as_str()))
        .transpose()
        .context("--assigned is not a valid partition name")?;
    let role = match args.get_one::<String>("role").map(String::as_str) {
        Some("employee") => Role::Employee,
        _ => Role::Admin,
    };
    let principal = Principal {
        role,
        ..Principal::admin(id.as_str())
    }
    .with_assigned_partition(assigned);

    let catalog = config.catalog();
    let listing = describe_catalog(&catalog);
    let resolution = resolve(catalog, principal, args.get_one::<String>("select").map(String::as_str));

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&resolution).context("serializing resolution")?);
    } else {
        print!("{listing}");
        println!();
        match (&resolution.partition, &resolution.error) {
            (Some(partition), _) => println!("{} ({}) -> {partition}", resolution.principal.id, resolution.principal.role),
            (None, Some(error)) => println!("{} ({}) -> unresolved: {error}", resolution.principal.id, resolution.principal.role),
            (None, None) => println!("{} ({}) -> unresolved", resolution.principal.id, resolution.principal.role),
        }
    }
    Ok(())
}
