//! Reroute CLI
//!
//! CLI tool for checking rule files and resolving URLs against them.

mod error;
mod report;
mod resolver;
mod snapshot;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use serde::Serialize;

use rr_engine::HostPeers;

use crate::error::CliError;
use crate::report::{HostReport, ResolveReport};
use crate::resolver::SystemResolver;
use crate::snapshot::{dropped_declarations, load_peer, load_store, Registries, StoreArgs};

#[derive(Parser)]
#[command(name = "rr-cli")]
#[command(about = "Reroute rule checker and resolver")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile rule files and print rule counts per category
    Check {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Resolve every category for a URL
    Resolve {
        #[command(flatten)]
        store: StoreArgs,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// Which `rule` match to report (0 = best)
        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Resolve the upstream host for a URL
    Host {
        #[command(flatten)]
        store: StoreArgs,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// Plugin rules, consulted before the main rules
        #[arg(long)]
        plugin_rules: Option<String>,

        /// Rules file consulted after the main rules
        #[arg(long)]
        file_rules: Option<String>,

        /// Header-injected rules, consulted last
        #[arg(long)]
        header_rules: Option<String>,

        /// Never reuse cached DNS answers
        #[arg(long)]
        no_dns_cache: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Check { store } => cmd_check(&store),
        Commands::Resolve { store, url, index } => cmd_resolve(&store, &url, index),
        Commands::Host {
            store,
            url,
            plugin_rules,
            file_rules,
            header_rules,
            no_dns_cache,
        } => {
            let peers = PeerFiles {
                plugin: plugin_rules,
                file: file_rules,
                header: header_rules,
            };
            cmd_host(&store, &url, &peers, no_dns_cache).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| CliError::Json {
        path: "<stdout>".to_string(),
        source,
    })?;
    println!("{json}");
    Ok(())
}

fn cmd_check(args: &StoreArgs) -> Result<(), CliError> {
    let registries = Registries::load(args)?;
    let rules = load_store(args, &registries)?;
    let snapshot = rules.reader().snapshot();

    println!("Rules: {}", args.rules);
    println!("  Appended:    {}", rules.appended_len());
    println!("  Disabled:    {}", rules.is_disabled());
    println!("  Total:       {}", snapshot.len());
    println!();

    println!("Categories:");
    for (name, count) in snapshot.counts() {
        if count > 0 {
            println!("  {name:<14} {count}");
        }
    }

    let dropped = dropped_declarations(args, &registries, &rules)?;
    if !dropped.is_empty() {
        println!();
        println!("Dropped: {}", dropped.len());
        for entry in &dropped {
            println!("  [{}] `{}`: {}", entry.source, entry.raw, entry.error);
        }
    }

    Ok(())
}

fn cmd_resolve(args: &StoreArgs, url: &str, index: usize) -> Result<(), CliError> {
    if url.is_empty() {
        return Err(CliError::Usage("URL must not be empty".to_string()));
    }
    let registries = Registries::load(args)?;
    let rules = load_store(args, &registries)?;
    if rules.is_disabled() {
        log::warn!("{} is empty, rules are disabled", args.rules);
    }

    let report = ResolveReport::new(
        url,
        rules.resolve_filter(url),
        rules.resolve_disable(url),
        &rules.resolve_rules(url),
        rules.resolve_proxy(url),
        rules.resolve_rule(url, index),
        rules.resolve_local_rule(url),
    );
    print_json(&report)
}

struct PeerFiles {
    plugin: Option<String>,
    file: Option<String>,
    header: Option<String>,
}

async fn cmd_host(args: &StoreArgs, url: &str, files: &PeerFiles, no_dns_cache: bool) -> Result<(), CliError> {
    if no_dns_cache {
        rr_engine::disable_dns_cache();
    }

    let registries = Registries::load(args)?;
    let rules = load_store(args, &registries)?;
    let load = |path: &Option<String>| {
        path.as_deref()
            .map(|path| load_peer(path, args, &registries))
            .transpose()
    };
    let plugin = load(&files.plugin)?;
    let file = load(&files.file)?;
    let header = load(&files.header)?;

    let peers = HostPeers {
        plugin: plugin.as_ref().map(|rules| rules.reader()),
        file: file.as_ref().map(|rules| rules.reader()),
        header: header.as_ref().map(|rules| rules.reader()),
    };

    let resolver = SystemResolver::default();
    let resolved = rules
        .resolve_host(url, peers, &resolver)
        .await
        .map_err(CliError::Lookup)?;
    print_json(&HostReport::new(url, resolved))
}
