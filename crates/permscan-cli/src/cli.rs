//! Command line definition and configuration merging
//!
//! Precedence: command-line flag, then config file, then built-in default.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use permscan_core::{ConfigError, RelevanceMode, ReportConfig};
use std::path::PathBuf;

/// Build the `permscan` command
#[must_use]
pub fn command() -> Command {
    Command::new("permscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Report the resources a subject can reach across a tenant")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file; flags override its values"),
        )
        .arg(
            Arg::new("inventory")
                .long("inventory")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Tenant inventory snapshot (JSON)"),
        )
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .global(true)
                .help("Tenant admin endpoint; must match the inventory"),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .short('p')
                .global(true)
                .help("Resource search pattern: '*' wildcards or an exact url"),
        )
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Resources per enumeration page"),
        )
        .arg(
            Arg::new("subject")
                .long("subject")
                .short('s')
                .help("Subject (login or claim) whose access is checked"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_parser(value_parser!(PathBuf))
                .help("Report file (.csv or .json); never overwritten"),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .action(ArgAction::SetTrue)
                .conflicts_with("min-labels")
                .help("Report every resource, including single-label and empty access"),
        )
        .arg(
            Arg::new("min-labels")
                .long("min-labels")
                .value_parser(value_parser!(usize))
                .help("Report grants with at least this many permissions"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .short('j')
                .value_parser(value_parser!(usize))
                .help("Maximum concurrent permission checks [default: 4]"),
        )
        .arg(
            Arg::new("probe-timeout")
                .long("probe-timeout")
                .value_parser(value_parser!(u64))
                .help("Per-check deadline in seconds"),
        )
        .subcommand(
            Command::new("sites").about("List matching sites and the tenant size"),
        )
}

/// Merge config file and flags
///
/// # Errors
/// `ConfigError` if the config file cannot be loaded.
pub fn resolve_config(matches: &ArgMatches) -> Result<ReportConfig, ConfigError> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };
    Ok(apply_report_flags(apply_shared_flags(config, matches), matches))
}

/// Merge config file and the flags `sites` accepts
///
/// # Errors
/// `ConfigError` if the config file cannot be loaded.
pub fn resolve_sites_config(matches: &ArgMatches) -> Result<ReportConfig, ConfigError> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };
    Ok(apply_shared_flags(config, matches))
}

fn apply_shared_flags(mut config: ReportConfig, matches: &ArgMatches) -> ReportConfig {
    if let Some(path) = matches.get_one::<PathBuf>("inventory") {
        config = config.with_inventory(path.clone());
    }
    if let Some(endpoint) = matches.get_one::<String>("endpoint") {
        config = config.with_endpoint(endpoint.clone());
    }
    if let Some(pattern) = matches.get_one::<String>("pattern") {
        config = config.with_pattern(pattern.clone());
    }
    if let Some(&page_size) = matches.get_one::<usize>("page-size") {
        config = config.with_page_size(page_size);
    }
    config
}

fn apply_report_flags(mut config: ReportConfig, matches: &ArgMatches) -> ReportConfig {
    if let Some(subject) = matches.get_one::<String>("subject") {
        config = config.with_subject(subject.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("output") {
        config = config.with_destination(path.clone());
    }
    if matches.get_flag("all") {
        config = config.with_relevance(RelevanceMode::All);
    } else if let Some(&n) = matches.get_one::<usize>("min-labels") {
        config = config.with_relevance(RelevanceMode::AtLeast(n));
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config = config.with_concurrency(concurrency);
    }
    if let Some(&secs) = matches.get_one::<u64>("probe-timeout") {
        config = config.with_probe_timeout_secs(secs);
    }
    config
}
