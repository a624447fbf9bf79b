use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod audit;
mod cli;
mod config;
mod errors;
mod matcher;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use matcher::{
    relevance::relevance, Candidate, LinkMatcher, MatchOptions, MatchRequest, ScoringModel,
};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Read a file, or stdin when `path` is `-`.
fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn scoring_model(config: &Config) -> Arc<ScoringModel> {
    Arc::new(ScoringModel::from_config(
        config.model.clone(),
        config.models_dir(),
    ))
}

/// Classify a JSON list of page stats, rejecting thresholds `/bulk-audit` rejects.
fn audit_report(pages_json: &str, link_ratio_threshold: f64) -> anyhow::Result<serde_json::Value> {
    if let Err(msg) = audit::check_link_ratio_threshold(link_ratio_threshold) {
        bail!(msg);
    }
    let pages: Vec<audit::PageStats> =
        serde_json::from_str(pages_json).context("pages must be a JSON list of page stats")?;

    let (results, summary) = audit::audit_pages(&pages, link_ratio_threshold);
    Ok(serde_json::json!({ "results": results, "summary": summary }))
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();
    let mut config = Config::load()?;

    match args.command {
        cli::Command::Serve { bind, lazy } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if lazy {
                config.server.preload_model = false;
            }
            web::start_daemon(config)
        }

        cli::Command::Match {
            content,
            targets,
            threshold,
            max_targets,
            keyword,
            match_type,
            window_size,
            overlap,
        } => {
            let source_content = read_input(&content)?;
            let targets: Vec<Candidate> = serde_json::from_str(&read_input(&targets)?)
                .context("targets must be a JSON list of {url, title, keywords?}")?;

            let request = MatchRequest {
                source_content,
                targets,
                threshold,
                max_targets,
                keyword,
                match_type,
                window_size,
                overlap,
            };

            let matcher = LinkMatcher::new(scoring_model(&config), config.matching.clone());
            let response = matcher.match_links(&request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }

        cli::Command::Windows {
            content,
            window_size,
            overlap,
        } => {
            let options = MatchOptions {
                threshold: config.matching.threshold,
                window_size: window_size.unwrap_or(config.matching.window_size),
                overlap: overlap.unwrap_or(config.matching.overlap),
            };
            if let Err(msg) = options.validate() {
                bail!(msg);
            }

            let text = read_input(&content)?;
            let windows = matcher::window(&text, options.window_size, options.overlap);
            println!("{}", serde_json::to_string_pretty(&windows)?);
            Ok(())
        }

        cli::Command::Score { source, titles } => {
            let model = scoring_model(&config);
            let scores = matcher::similarities(model.as_ref(), &source, &titles)?;

            let output: Vec<_> = scores
                .iter()
                .map(|s| serde_json::json!({ "title": titles[s.index], "score": s.score }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }

        cli::Command::Relevance {
            content,
            keywords,
            match_type,
        } => {
            let text = read_input(&content)?;
            println!("{}", relevance(&text, &keywords, match_type));
            Ok(())
        }

        cli::Command::Audit {
            pages,
            link_ratio_threshold,
        } => {
            let threshold = link_ratio_threshold.unwrap_or(config.audit.link_ratio_threshold);
            let output = audit_report(&read_input(&pages)?, threshold)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
