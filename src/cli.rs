use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl the navigation, classify every link and write the section tree.
    Discover(DiscoverArgs),
    /// Render every article and merge them into one bookmarked PDF.
    Build(BuildArgs),
    /// Export every article as Markdown with offline images.
    Markdown(MarkdownArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Start URL (default: the taxonomy's site root).
    #[arg(long)]
    pub url: Option<String>,

    /// Site taxonomy YAML (default: the built-in Human Interface Guidelines taxonomy).
    #[arg(long)]
    pub taxonomy: Option<String>,

    /// Page load timeout for the start page, landing pages and articles.
    #[arg(long, default_value_t = 60)]
    pub page_timeout_secs: u64,

    /// How long to wait for the navigation sidebar before falling back to landing pages.
    #[arg(long, default_value_t = 20)]
    pub nav_timeout_secs: u64,

    /// Page load timeout while reading an article's context for classification.
    #[arg(long, default_value_t = 30)]
    pub classify_timeout_secs: u64,

    /// Image wait (PDF) and image download (Markdown) timeout.
    #[arg(long, default_value_t = 15)]
    pub image_timeout_secs: u64,

    /// Hard ceiling on scroll steps per collection pass.
    #[arg(long, default_value_t = 400)]
    pub max_scroll_steps: usize,

    /// Also crawl section and sub-section landing pages when the sidebar is found.
    #[arg(long)]
    pub crawl_landing_pages: bool,

    /// Show the browser window.
    #[arg(long)]
    pub headful: bool,

    /// Chrome/Chromium executable (default: auto-detect).
    #[arg(long)]
    pub chrome: Option<String>,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output path for `tree.yaml`.
    #[arg(long)]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output directory for the merged PDF.
    #[arg(long)]
    pub out: String,

    /// Reuse a section tree written by `discover` instead of crawling.
    #[arg(long)]
    pub tree: Option<String>,

    /// File name of the merged PDF, without extension.
    #[arg(long, default_value = "Human Interface Guidelines")]
    pub output_name: String,

    /// Text printed at the top of every article page.
    #[arg(long)]
    pub page_header: Option<String>,
}

#[derive(Debug, Args)]
pub struct MarkdownArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output directory for the Markdown tree.
    #[arg(long)]
    pub out: String,

    /// Reuse a section tree written by `discover` instead of crawling.
    #[arg(long)]
    pub tree: Option<String>,
}
