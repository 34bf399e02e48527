use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::browser::{BrowserOptions, ChromeSession, PageDriver};
use crate::cli::{CommonArgs, DiscoverArgs};
use crate::crawl::CrawlOptions;
use crate::formats::SectionTree;
use crate::taxonomy::Taxonomy;

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub crawl: CrawlOptions,
    pub classify_timeout: Duration,
}

impl DiscoverOptions {
    pub fn from_args(args: &CommonArgs, taxonomy: &Taxonomy) -> anyhow::Result<Self> {
        let start_url = match &args.url {
            Some(url) => {
                let url = Url::parse(url).context("parse --url")?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    anyhow::bail!("--url must be http/https: {url}");
                }
                url
            }
            None => taxonomy.start_url()?,
        };
        Ok(Self {
            crawl: CrawlOptions {
                start_url,
                page_timeout: Duration::from_secs(args.page_timeout_secs),
                nav_timeout: Duration::from_secs(args.nav_timeout_secs),
                max_scroll_steps: args.max_scroll_steps,
                crawl_landing_pages: args.crawl_landing_pages,
            },
            classify_timeout: Duration::from_secs(args.classify_timeout_secs),
        })
    }
}

pub fn browser_options(args: &CommonArgs) -> BrowserOptions {
    BrowserOptions {
        headful: args.headful,
        chrome_executable: args.chrome.as_ref().map(PathBuf::from),
        ..BrowserOptions::default()
    }
}

pub async fn discover_tree<D>(
    driver: &D,
    taxonomy: &Taxonomy,
    options: &DiscoverOptions,
) -> SectionTree
where
    D: PageDriver + ?Sized,
{
    let links = crate::crawl::discover_links(driver, taxonomy, &options.crawl).await;
    let classified =
        crate::classify::classify_links(driver, taxonomy, &links, options.classify_timeout).await;
    let tree = crate::tree::assemble(taxonomy, classified);
    crate::tree::log_summary(&tree);
    tree
}

pub async fn load_or_discover<D>(
    driver: &D,
    taxonomy: &Taxonomy,
    args: &CommonArgs,
    tree_path: Option<&str>,
) -> anyhow::Result<SectionTree>
where
    D: PageDriver + ?Sized,
{
    match tree_path {
        Some(path) => {
            let tree = read_tree(Path::new(path))?;
            tracing::info!(path, articles = tree.article_count(), "loaded section tree");
            Ok(tree)
        }
        None => {
            let options = DiscoverOptions::from_args(args, taxonomy)?;
            Ok(discover_tree(driver, taxonomy, &options).await)
        }
    }
}

pub fn read_tree(path: &Path) -> anyhow::Result<SectionTree> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("read tree: {}", path.display()))?;
    serde_yaml::from_str(&yaml).with_context(|| format!("parse tree: {}", path.display()))
}

pub fn write_tree(path: &Path, tree: &SectionTree) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create tree output dir: {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(tree).context("serialize tree yaml")?;
    std::fs::write(path, yaml).with_context(|| format!("write tree: {}", path.display()))?;
    Ok(())
}

pub async fn run(args: DiscoverArgs) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::load(args.common.taxonomy.as_deref().map(Path::new))?;
    let options = DiscoverOptions::from_args(&args.common, &taxonomy)?;

    let session = ChromeSession::launch(&browser_options(&args.common)).await?;
    let tree = discover_tree(session.driver(), &taxonomy, &options).await;
    if let Err(err) = session.close().await {
        tracing::warn!(error = %format!("{err:#}"), "close browser");
    }

    if tree.is_empty() {
        tracing::warn!("discovery found no articles");
    }
    let out = PathBuf::from(&args.out);
    write_tree(&out, &tree)?;
    tracing::info!(path = %out.display(), articles = tree.article_count(), "section tree written");
    Ok(())
}
