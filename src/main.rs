#![allow(clippy::multiple_crate_versions)]

use clap::{Arg, ArgAction, Command};

mod commands;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let matches = Command::new("symbi")
        .version(VERSION)
        .about("Regulatory-compliance research agent")
        .subcommand(
            Command::new("compliance")
                .about("Regulatory-compliance research agent")
                .subcommand(
                    Command::new("query")
                        .about("Run a compliance research query")
                        .arg(Arg::new("text").value_name("TEXT").required(true))
                        .arg(
                            Arg::new("jurisdiction")
                                .short('j')
                                .long("jurisdiction")
                                .value_name("CODE")
                                .help("Jurisdiction hint, e.g. TW"),
                        )
                        .arg(
                            Arg::new("skip-cache")
                                .long("skip-cache")
                                .action(ArgAction::SetTrue)
                                .help("Bypass the query cache"),
                        ),
                )
                .subcommand(
                    Command::new("verify")
                        .about("Re-probe stale regulation baselines")
                        .arg(
                            Arg::new("days")
                                .long("days")
                                .value_name("DAYS")
                                .help("Staleness threshold in days"),
                        ),
                )
                .subcommand(
                    Command::new("baseline")
                        .about("Manage the regulation baseline store")
                        .subcommand(
                            Command::new("add")
                                .arg(Arg::new("name").long("name").required(true))
                                .arg(Arg::new("country").long("country").required(true))
                                .arg(Arg::new("industry").long("industry").required(true))
                                .arg(Arg::new("topic").long("topic").required(true)),
                        )
                        .subcommand(
                            Command::new("query")
                                .arg(Arg::new("country").long("country"))
                                .arg(Arg::new("industry").long("industry"))
                                .arg(Arg::new("topic").long("topic")),
                        )
                        .subcommand(
                            Command::new("keywords")
                                .arg(Arg::new("country").long("country").required(true))
                                .arg(Arg::new("industry").long("industry"))
                                .arg(Arg::new("topic").long("topic")),
                        )
                        .subcommand(Command::new("stats")),
                )
                .subcommand(
                    Command::new("cache")
                        .about("Inspect the query cache")
                        .subcommand(Command::new("list"))
                        .subcommand(Command::new("clear")),
                )
                .subcommand(
                    Command::new("history")
                        .about("Inspect past queries")
                        .subcommand(Command::new("list"))
                        .subcommand(Command::new("show").arg(Arg::new("id").value_name("ID").required(true)))
                        .subcommand(Command::new("clear")),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("compliance", sub_matches)) => {
            commands::compliance::run(sub_matches).await;
        }
        _ => {
            println!("symbi v{}", VERSION);
            println!("Use --help for available commands");
        }
    }
}
