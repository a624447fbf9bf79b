use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::matcher::MatchType;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Address to listen on, overrides server.bind
        #[clap(long)]
        bind: Option<String>,

        /// Load the model on first request instead of at startup
        #[clap(long, default_value = "false")]
        lazy: bool,
    },

    /// Find link opportunities in a document
    Match {
        /// Source document, `-` for stdin
        #[clap(short, long)]
        content: PathBuf,

        /// JSON file with a list of {url, title, keywords?} targets
        #[clap(short, long)]
        targets: PathBuf,

        /// Minimum similarity
        #[clap(long)]
        threshold: Option<f32>,

        /// Prefilter targets down to this many by keyword relevance
        #[clap(long)]
        max_targets: Option<usize>,

        /// Focus keyword for the prefilter
        #[clap(short, long)]
        keyword: Option<String>,

        #[clap(long, value_enum, default_value_t = MatchType::Stemmed)]
        match_type: MatchType,

        #[clap(long)]
        window_size: Option<usize>,

        #[clap(long)]
        overlap: Option<usize>,
    },

    /// Print the windows a document is split into
    Windows {
        /// Source document, `-` for stdin
        #[clap(short, long)]
        content: PathBuf,

        #[clap(long)]
        window_size: Option<usize>,

        #[clap(long)]
        overlap: Option<usize>,
    },

    /// Score a text against one or more titles
    Score {
        source: String,

        /// Candidate title, repeatable
        #[clap(short, long = "title", required = true)]
        titles: Vec<String>,
    },

    /// Keyword relevance of a document, 0 to 5
    Relevance {
        /// Source document, `-` for stdin
        #[clap(short, long)]
        content: PathBuf,

        /// Keyword, repeatable
        #[clap(short, long = "keyword", required = true)]
        keywords: Vec<String>,

        #[clap(long, value_enum, default_value_t = MatchType::Stemmed)]
        match_type: MatchType,
    },

    /// Classify pages by link density
    Audit {
        /// JSON file with a list of page stats
        #[clap(short, long)]
        pages: PathBuf,

        /// Words per internal link above which a page needs links
        #[clap(long)]
        link_ratio_threshold: Option<f64>,
    },
}
