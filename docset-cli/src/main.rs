//! Docset CLI - search offline documentation from the terminal

use clap::{Parser, Subcommand};
use docset_core::{
    engine_from_config, installed_docsets, Candidate, Config, DocsetError, FeedClient,
    InstallSource, Installer, Registry, SearchOptions, Searcher,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docset")]
#[command(about = "Search offline documentation docsets", long_about = None)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/docset/config.toml)
    #[arg(long, global = true, env = "DOCSET_CONFIG")]
    config: Option<PathBuf>,

    /// Context whose docsets are searched ahead of the common ones (e.g. a file type)
    #[arg(long, global = true, env = "DOCSET_CONTEXT")]
    context: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search active docsets ("<docset> <terms>" searches one docset)
    Search {
        /// Search terms
        #[arg(required = true)]
        pattern: Vec<String>,

        /// Override the configured candidate template
        #[arg(long)]
        format: Option<String>,
    },

    /// List every symbol of the active docsets
    List,

    /// Open a search result in the browser
    Open {
        /// Search terms
        #[arg(required = true)]
        pattern: Vec<String>,

        /// Which result to open (0-based)
        #[arg(short, long, default_value_t = 0)]
        index: usize,
    },

    /// Show docsets installed under the docsets root
    Installed,

    /// Add an installed docset to the common set
    Activate {
        name: String,
    },

    /// Remove a docset from the common set
    Deactivate {
        name: String,
    },

    /// Download and install a docset
    Install {
        /// Official docset name, contributed docset name, or archive URL
        target: String,

        /// Install from an archive already on disk
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Look the name up in the user-contributed catalog
        #[arg(long)]
        contrib: bool,
    },

    /// List docsets available for installation
    Feeds {
        /// Show the user-contributed catalog instead of the official one
        #[arg(long)]
        contrib: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCSET_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = run(&cli);

    if let Err(e) = result {
        if cli.json {
            let envelope = e.envelope();
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| e.to_string())
            );
        } else {
            eprintln!("Error: {}", e);
            let hint = e.hint();
            if !hint.is_empty() {
                eprintln!("Hint: {}", hint);
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> docset_core::Result<()> {
    let config_path = Config::default_path(cli.config.as_deref())?;
    let config = Config::load_or_default(&config_path)?;

    match &cli.command {
        Commands::Search { pattern, format } => {
            cmd_search(&config, cli, &pattern.join(" "), format.as_deref())
        }
        Commands::List => cmd_list(&config, cli),
        Commands::Open { pattern, index } => cmd_open(&config, cli, &pattern.join(" "), *index),
        Commands::Installed => cmd_installed(&config, cli.json),
        Commands::Activate { name } => cmd_activate(config, &config_path, name, cli.json),
        Commands::Deactivate { name } => cmd_deactivate(config, &config_path, name, cli.json),
        Commands::Install {
            target,
            archive,
            contrib,
        } => cmd_install(
            config,
            &config_path,
            target,
            archive.clone(),
            *contrib,
            cli.json,
        ),
        Commands::Feeds { contrib } => cmd_feeds(&config, *contrib, cli.json),
    }
}

/// Registry with the common set and, when given, the context's docsets
fn open_registry(config: &Config, context: Option<&str>) -> docset_core::Result<Registry> {
    let mut registry = Registry::new(config.docsets_path());
    registry.ensure_common(config.docsets.common.iter().cloned())?;
    if let Some(context) = context {
        registry.ensure_contextual(config.context_docsets(context).iter().cloned())?;
    }
    Ok(registry)
}

#[derive(Serialize)]
struct CandidateOutput<'a> {
    #[serde(flatten)]
    candidate: &'a Candidate,
    url: String,
}

fn print_candidates(registry: &Registry, candidates: &[Candidate], json: bool) {
    use colored::Colorize;

    if json {
        let out: Vec<_> = candidates
            .iter()
            .map(|candidate| CandidateOutput {
                candidate,
                url: registry.result_url(&candidate.docset, &candidate.row),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&out).unwrap_or_else(|_| "[]".to_string())
        );
        return;
    }

    for (i, candidate) in candidates.iter().enumerate() {
        println!(
            "{:>4} {} {}",
            i.to_string().dimmed(),
            candidate.display,
            format!("[{}]", candidate.row.symbol_type).cyan()
        );
    }
    println!("({} results)", candidates.len());
}

fn cmd_search(
    config: &Config,
    cli: &Cli,
    pattern: &str,
    format: Option<&str>,
) -> docset_core::Result<()> {
    let registry = open_registry(config, cli.context.as_deref())?;
    let engine = engine_from_config(config);
    let mut options = SearchOptions::from_config(config);
    if let Some(template) = format {
        options = options.with_template(template);
    }

    let searcher = Searcher::new(&registry, engine.as_ref()).with_options(options);
    let candidates = searcher.search(pattern);
    print_candidates(&registry, &candidates, cli.json);
    Ok(())
}

fn cmd_list(config: &Config, cli: &Cli) -> docset_core::Result<()> {
    let registry = open_registry(config, cli.context.as_deref())?;
    let engine = engine_from_config(config);
    let searcher = Searcher::new(&registry, engine.as_ref())
        .with_options(SearchOptions::from_config(config));

    print_candidates(&registry, &searcher.list_all(), cli.json);
    Ok(())
}

fn cmd_open(config: &Config, cli: &Cli, pattern: &str, index: usize) -> docset_core::Result<()> {
    use colored::Colorize;

    let registry = open_registry(config, cli.context.as_deref())?;
    let engine = engine_from_config(config);
    let searcher = Searcher::new(&registry, engine.as_ref())
        .with_options(SearchOptions::from_config(config));

    let candidates = searcher.search(pattern);
    let Some(candidate) = candidates.get(index) else {
        println!("No result #{} for {:?} ({} results)", index, pattern, candidates.len());
        return Ok(());
    };

    let url = registry.result_url(&candidate.docset, &candidate.row);
    open_url(&config.browser.command, &url)?;

    if cli.json {
        println!("{}", serde_json::json!({ "opened": url }));
    } else {
        println!("{}: {}", "Opened".green(), url);
    }
    Ok(())
}

/// Hand `url` to the configured browser command or the platform opener
fn open_url(command: &str, url: &str) -> docset_core::Result<()> {
    let mut parts = command.split_whitespace();
    let mut cmd = match parts.next() {
        Some(program) => {
            let mut cmd = Command::new(program);
            cmd.args(parts);
            cmd
        }
        None if cfg!(target_os = "macos") => Command::new("open"),
        None => Command::new("xdg-open"),
    };
    tracing::debug!(url, "opening result");
    cmd.arg(url).spawn()?;
    Ok(())
}

fn cmd_installed(config: &Config, json: bool) -> docset_core::Result<()> {
    use colored::Colorize;

    let root = config.docsets_path();
    let names = installed_docsets(&root)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "root": root, "installed": names, "common": config.docsets.common })
        );
    } else {
        if names.is_empty() {
            println!("No docsets installed under {}", root.display());
        }
        for name in &names {
            let marker = if config.docsets.common.contains(name) {
                "*".green()
            } else {
                " ".normal()
            };
            println!("{} {}", marker, name);
        }
        println!("({} docsets, * = active)", names.len());
    }
    Ok(())
}

fn cmd_activate(
    mut config: Config,
    config_path: &Path,
    name: &str,
    json: bool,
) -> docset_core::Result<()> {
    use colored::Colorize;

    // Fail before touching the config if the docset cannot be opened.
    let mut registry = Registry::new(config.docsets_path());
    let dialect = registry.activate_common(name)?.dialect;

    if !config.docsets.common.iter().any(|n| n == name) {
        config.docsets.common.push(name.to_string());
        config.save(config_path)?;
    }

    if json {
        println!("{}", serde_json::json!({ "activated": name, "dialect": dialect }));
    } else {
        println!("{}: {} ({})", "Activated".green(), name, dialect);
    }
    Ok(())
}

fn cmd_deactivate(
    mut config: Config,
    config_path: &Path,
    name: &str,
    json: bool,
) -> docset_core::Result<()> {
    use colored::Colorize;

    let before = config.docsets.common.len();
    config.docsets.common.retain(|n| n != name);
    let removed = config.docsets.common.len() != before;
    if removed {
        config.save(config_path)?;
    }

    if json {
        println!("{}", serde_json::json!({ "deactivated": name, "removed": removed }));
    } else if removed {
        println!("{}: {}", "Deactivated".yellow(), name);
    } else {
        println!("{} was not active", name);
    }
    Ok(())
}

fn cmd_install(
    mut config: Config,
    config_path: &Path,
    target: &str,
    archive: Option<PathBuf>,
    contrib: bool,
    json: bool,
) -> docset_core::Result<()> {
    use colored::Colorize;

    let (source, requested) = if let Some(path) = archive {
        (InstallSource::Archive(path), target.to_string())
    } else if target.starts_with("http://") || target.starts_with("https://") {
        (InstallSource::Url(target.to_string()), name_from_url(target))
    } else {
        let feeds = FeedClient::new(config.timeout_duration())?;
        let url = if contrib {
            feeds
                .contributed_docsets()?
                .into_iter()
                .find(|d| d.name.eq_ignore_ascii_case(target))
                .map(|d| d.archive_url)
                .ok_or_else(|| DocsetError::DocsetNotFound {
                    name: target.to_string(),
                    root: PathBuf::from(docset_core::feeds::CONTRIB_BASE),
                })?
        } else {
            feeds.official_archive_url(target)?
        };
        (InstallSource::Url(url), target.to_string())
    };

    let mut registry = Registry::new(config.docsets_path());
    let installer = Installer::from_config(&config);
    let installed = installer.install(&mut registry, source, &requested)?;

    if !config.docsets.common.iter().any(|n| n == &installed.name) {
        config.docsets.common.push(installed.name.clone());
        config.save(config_path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&installed)?);
    } else {
        println!(
            "{}: {} ({})",
            "Installed".green(),
            installed.name,
            installed.docset_dir.display().to_string().dimmed()
        );
        if installed.name != installed.requested {
            println!(
                "{}: registered as {:?}, not {:?}",
                "Note".yellow(),
                installed.name,
                installed.requested
            );
        }
    }
    Ok(())
}

/// `https://host/feeds/Redis.tgz` -> `Redis`
fn name_from_url(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    file.split('.').next().unwrap_or(file).to_string()
}

fn cmd_feeds(config: &Config, contrib: bool, json: bool) -> docset_core::Result<()> {
    let feeds = FeedClient::new(config.timeout_duration())?;

    if contrib {
        let docsets = feeds.contributed_docsets()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&docsets)?);
        } else {
            for docset in &docsets {
                println!("{}", docset.name);
            }
            println!("({} contributed docsets)", docsets.len());
        }
    } else {
        let names = feeds.official_feed_names()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&names)?);
        } else {
            for name in &names {
                println!("{}", name);
            }
            println!("({} official docsets)", names.len());
        }
    }
    Ok(())
}
