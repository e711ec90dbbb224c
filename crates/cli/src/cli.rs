use clap::Parser;

/// Search a book archive and open the results.
#[derive(Parser, Debug)]
#[command(name = "shelf")]
#[command(author, version, about = "Search a book archive and open the results")]
pub(crate) struct Args {
    /// Search terms, e.g. "ruby programming"
    #[arg(required_unless_present_any = ["cache_stats", "clear_cache"])]
    pub query: Option<String>,

    /// Books to open: comma-separated numbers such as "1,3", or "all"
    pub selection: Option<String>,

    /// Ignore cached results and search again
    #[arg(long)]
    pub refresh: bool,

    /// Print the outcome as JSON and never prompt
    #[arg(long)]
    pub json: bool,

    /// Resolve the selection but do not launch anything
    #[arg(long)]
    pub no_open: bool,

    /// Print cache entry count and size, then exit
    #[arg(long, conflicts_with = "clear_cache")]
    pub cache_stats: bool,

    /// Delete every cache entry, then exit
    #[arg(long)]
    pub clear_cache: bool,
}
