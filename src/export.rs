use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

use crate::assets::AssetFetcher;
use crate::browser::{ChromeSession, PageDriver, evaluate_as};
use crate::cli::MarkdownArgs;
use crate::dedup::{ContentHashCache, content_hash};
use crate::formats::{ManifestEntry, MarkdownFrontMatter, PlacedArticle, SectionTree};
use crate::layout::{markdown_dir, portable_path, slugify, unique_markdown_path};
use crate::taxonomy::Taxonomy;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const SUMMARY_FILE_NAME: &str = "SUMMARY.md";
pub const README_FILE_NAME: &str = "README.md";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    pub book_title: String,
    pub page_timeout: Duration,
}

#[derive(Debug, Clone)]
struct ExportedFile {
    relative_path: String,
    slug: String,
    bytes: u64,
}

pub async fn run(args: MarkdownArgs) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::load(args.common.taxonomy.as_deref().map(Path::new))?;
    let options = ExportOptions {
        out_dir: PathBuf::from(&args.out),
        book_title: taxonomy.site.book_title.clone(),
        page_timeout: Duration::from_secs(args.common.page_timeout_secs),
    };
    let fetcher = AssetFetcher::new(Duration::from_secs(args.common.image_timeout_secs))?;

    let session =
        ChromeSession::launch(&crate::discover::browser_options(&args.common)).await?;
    let result = async {
        let tree = crate::discover::load_or_discover(
            session.driver(),
            &taxonomy,
            &args.common,
            args.tree.as_deref(),
        )
        .await?;
        export_markdown(session.driver(), &fetcher, &tree, &options).await
    }
    .await;
    if let Err(err) = session.close().await {
        tracing::warn!(error = %format!("{err:#}"), "close browser");
    }

    let manifest = result?;
    tracing::info!(
        out = %options.out_dir.display(),
        entries = manifest.len(),
        "markdown export finished"
    );
    Ok(())
}

pub async fn export_markdown<D>(
    driver: &D,
    fetcher: &AssetFetcher,
    tree: &SectionTree,
    options: &ExportOptions,
) -> anyhow::Result<Vec<ManifestEntry>>
where
    D: PageDriver + ?Sized,
{
    if tree.is_empty() {
        anyhow::bail!("section tree has no articles");
    }
    std::fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("create export dir: {}", options.out_dir.display()))?;

    let placed = tree.placed_articles();
    let mut seen_urls = HashSet::new();
    let mut taken_paths = HashSet::new();
    let mut cache: ContentHashCache<ExportedFile> = ContentHashCache::new();
    let mut manifest = Vec::new();

    for (idx, placed_article) in placed.iter().enumerate() {
        let url = &placed_article.article.url;
        if !seen_urls.insert(url.as_str()) {
            continue;
        }
        match export_article(
            driver,
            fetcher,
            placed_article,
            options,
            &mut cache,
            &mut taken_paths,
        )
        .await
        {
            Ok(entry) => {
                tracing::info!(
                    n = idx + 1,
                    total = placed.len(),
                    %url,
                    path = %entry.relative_path,
                    "exported article"
                );
                manifest.push(entry);
            }
            Err(err) => {
                tracing::warn!(%url, error = %format!("{err:#}"), "markdown export failed; skipping");
            }
        }
    }

    if manifest.is_empty() {
        anyhow::bail!("no article exported");
    }

    write_summary(&options.out_dir, tree, &manifest)?;
    write_readme(&options.out_dir, &options.book_title)?;
    manifest.sort_by(|a, b| manifest_key(a).cmp(&manifest_key(b)));
    write_manifest(&options.out_dir, &manifest)?;
    Ok(manifest)
}

async fn export_article<D: PageDriver + ?Sized>(
    driver: &D,
    fetcher: &AssetFetcher,
    placed: &PlacedArticle<'_>,
    options: &ExportOptions,
    cache: &mut ContentHashCache<ExportedFile>,
    taken_paths: &mut HashSet<PathBuf>,
) -> anyhow::Result<ManifestEntry> {
    let article = placed.article;
    driver
        .navigate(&article.url, options.page_timeout)
        .await
        .context("load article")?;
    let text: String = evaluate_as(driver, crate::scripts::MAIN_TEXT)
        .await
        .context("read main text")?;
    let hash = content_hash(&text);
    let mut front_matter = MarkdownFrontMatter {
        title: article.title.clone(),
        source_url: article.url.clone(),
        section: placed.section.to_owned(),
        sub_section: placed.sub_section.map(str::to_owned),
        slug: slugify(&article.title),
        fetched_at: chrono::Utc::now().to_rfc3339(),
    };

    let (file, hit) = match cache.get(&hash) {
        Some(file) => (file.clone(), true),
        None => {
            let file =
                write_article(driver, fetcher, placed, options, &front_matter, taken_paths).await?;
            cache.insert(hash.clone(), file.clone());
            (file, false)
        }
    };
    front_matter.slug = file.slug;
    if hit {
        tracing::info!(
            url = %article.url,
            path = %file.relative_path,
            "duplicate content; pointing at existing file"
        );
    }

    Ok(ManifestEntry {
        front_matter,
        relative_path: file.relative_path,
        bytes: file.bytes,
        content_hash: hash,
    })
}

async fn write_article<D: PageDriver + ?Sized>(
    driver: &D,
    fetcher: &AssetFetcher,
    placed: &PlacedArticle<'_>,
    options: &ExportOptions,
    front_matter: &MarkdownFrontMatter,
    taken_paths: &mut HashSet<PathBuf>,
) -> anyhow::Result<ExportedFile> {
    let relative_dir = markdown_dir(placed.section, placed.sub_section);
    let relative_path = unique_markdown_path(&relative_dir, &front_matter.slug, taken_paths);
    let article_dir = options.out_dir.join(&relative_dir);
    // The slug written to disk is the final file stem, counter included.
    let slug = relative_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| front_matter.slug.clone());
    let front_matter = MarkdownFrontMatter {
        slug: slug.clone(),
        ..front_matter.clone()
    };

    let html: String = evaluate_as(driver, crate::scripts::MAIN_HTML)
        .await
        .context("read main html")?;
    let page_url = Url::parse(&placed.article.url).context("parse article url")?;
    let html =
        crate::assets::localize_images(fetcher, &html, &page_url, &article_dir, &slug).await;
    let body = html2md::parse_html(&html);

    let yaml = serde_yaml::to_string(&front_matter).context("serialize front matter")?;
    let contents = format!("---\n{yaml}---\n\n{}\n", body.trim());
    std::fs::create_dir_all(&article_dir)
        .with_context(|| format!("create article dir: {}", article_dir.display()))?;
    let path = options.out_dir.join(&relative_path);
    std::fs::write(&path, &contents)
        .with_context(|| format!("write markdown: {}", path.display()))?;

    Ok(ExportedFile {
        relative_path: portable_path(&relative_path),
        slug,
        bytes: contents.len() as u64,
    })
}

fn manifest_key(entry: &ManifestEntry) -> (&str, &str, &str) {
    let fm = &entry.front_matter;
    (
        fm.section.as_str(),
        fm.sub_section.as_deref().unwrap_or_default(),
        fm.title.as_str(),
    )
}

fn write_manifest(out_dir: &Path, manifest: &[ManifestEntry]) -> anyhow::Result<()> {
    let path = out_dir.join(MANIFEST_FILE_NAME);
    let json = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    std::fs::write(&path, format!("{json}\n"))
        .with_context(|| format!("write manifest: {}", path.display()))?;
    Ok(())
}

fn render_summary(tree: &SectionTree, manifest: &[ManifestEntry]) -> String {
    let path_of = |url: &str| {
        manifest
            .iter()
            .find(|e| e.front_matter.source_url == url)
            .map(|e| e.relative_path.as_str())
    };

    let mut out = String::from("# Summary\n\n");
    for section in &tree.sections {
        if !section.articles().any(|a| path_of(&a.url).is_some()) {
            continue;
        }
        let _ = writeln!(out, "- {}", section.title);
        for article in &section.articles {
            if let Some(path) = path_of(&article.url) {
                let _ = writeln!(out, "  - [{}]({path})", article.title);
            }
        }
        for sub in &section.sub_sections {
            if !sub.articles.iter().any(|a| path_of(&a.url).is_some()) {
                continue;
            }
            let _ = writeln!(out, "  - {}", sub.title);
            for article in &sub.articles {
                if let Some(path) = path_of(&article.url) {
                    let _ = writeln!(out, "    - [{}]({path})", article.title);
                }
            }
        }
    }
    out
}

fn write_summary(out_dir: &Path, tree: &SectionTree, manifest: &[ManifestEntry]) -> anyhow::Result<()> {
    let path = out_dir.join(SUMMARY_FILE_NAME);
    std::fs::write(&path, render_summary(tree, manifest))
        .with_context(|| format!("write summary: {}", path.display()))?;
    Ok(())
}

fn write_readme(out_dir: &Path, book_title: &str) -> anyhow::Result<()> {
    let path = out_dir.join(README_FILE_NAME);
    let readme = format!(
        "# {book_title} (Markdown export)\n\n\
         - One file per article, with YAML front matter describing its section.\n\
         - Files are organized as `section/[sub-section/]article.md`; images live in `_assets/` next to them.\n\
         - `{SUMMARY_FILE_NAME}` is a clickable outline; `{MANIFEST_FILE_NAME}` lists every file with its content hash and size.\n"
    );
    std::fs::write(&path, readme).with_context(|| format!("write readme: {}", path.display()))?;
    Ok(())
}
