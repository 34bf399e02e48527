use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::browser::{PageDriver, PdfLayout, evaluate_as};
use crate::dedup::{ContentHashCache, content_hash};
use crate::formats::{Article, SectionTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub path: PathBuf,
    pub page_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactMap {
    entries: HashMap<String, RenderedArtifact>,
}

impl ArtifactMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, artifact: RenderedArtifact) {
        self.entries.insert(url.into(), artifact);
    }

    pub fn get(&self, url: &str) -> Option<&RenderedArtifact> {
        self.entries.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn distinct_paths(&self) -> BTreeSet<&Path> {
        self.entries.values().map(|a| a.path.as_path()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub out_dir: PathBuf,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
    pub layout: PdfLayout,
}

pub async fn render_articles<D>(
    driver: &D,
    tree: &SectionTree,
    options: &RenderOptions,
) -> anyhow::Result<ArtifactMap>
where
    D: PageDriver + ?Sized,
{
    tokio::fs::create_dir_all(&options.out_dir)
        .await
        .with_context(|| format!("create render dir: {}", options.out_dir.display()))?;

    let total = tree.article_count();
    let mut cache = ContentHashCache::new();
    let mut artifacts = ArtifactMap::new();
    for (idx, article) in tree.articles().enumerate() {
        if artifacts.contains(&article.url) {
            continue;
        }
        let sequence = idx + 1;
        match render_article(driver, article, sequence, options, &mut cache).await {
            Ok((artifact, reused)) => {
                if reused {
                    tracing::info!(
                        url = %article.url,
                        path = %artifact.path.display(),
                        "duplicate content; reusing artifact"
                    );
                } else {
                    tracing::info!(
                        n = sequence,
                        total,
                        url = %article.url,
                        pages = artifact.page_count,
                        "rendered article"
                    );
                }
                artifacts.insert(article.url.clone(), artifact);
            }
            Err(err) => {
                tracing::warn!(url = %article.url, error = %format!("{err:#}"), "render failed; skipping");
            }
        }
    }

    tracing::info!(
        articles = artifacts.len(),
        files = cache.len(),
        of = total,
        "rendering finished"
    );
    Ok(artifacts)
}

async fn render_article<D: PageDriver + ?Sized>(
    driver: &D,
    article: &Article,
    sequence: usize,
    options: &RenderOptions,
    cache: &mut ContentHashCache<RenderedArtifact>,
) -> anyhow::Result<(RenderedArtifact, bool)> {
    driver
        .navigate(&article.url, options.page_timeout)
        .await
        .context("load article")?;
    let text: String = evaluate_as(driver, crate::scripts::MAIN_TEXT)
        .await
        .context("read main text")?;
    let hash = content_hash(&text);

    let lookup = cache
        .get_or_try_insert_with(&hash, || async {
            apply_page_breaks(driver, &article.url).await;
            wait_for_images(driver, &article.url, options.image_timeout).await;

            let bytes = driver
                .print_pdf(&options.layout)
                .await
                .context("print article")?;
            let path = crate::layout::article_pdf_path(
                &options.out_dir,
                sequence,
                &article.url,
                &article.title,
            );
            let page_count = crate::pdf::page_count_of_bytes(&bytes)?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("write {}", path.display()))?;
            Ok(RenderedArtifact { path, page_count })
        })
        .await?;
    Ok((lookup.value, lookup.hit))
}

async fn apply_page_breaks<D: PageDriver + ?Sized>(driver: &D, url: &str) {
    if let Err(err) = driver.evaluate(crate::scripts::PAGE_BREAKS).await {
        tracing::warn!(%url, error = %format!("{err:#}"), "page break transform failed");
    }
}

async fn wait_for_images<D: PageDriver + ?Sized>(driver: &D, url: &str, timeout: Duration) {
    if let Err(err) = driver.wait_for_selector("img", timeout).await {
        tracing::debug!(%url, error = %format!("{err:#}"), "no images before timeout");
    }
}

pub async fn render_html_page<D: PageDriver + ?Sized>(
    driver: &D,
    html: &str,
    layout: &PdfLayout,
    path: &Path,
) -> anyhow::Result<u32> {
    driver.set_content(html).await?;
    let bytes = driver.print_pdf(layout).await?;
    let pages = crate::pdf::page_count_of_bytes(&bytes)?;
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, pages: u32) -> RenderedArtifact {
        RenderedArtifact {
            path: PathBuf::from(name),
            page_count: pages,
        }
    }

    #[test]
    fn shared_artifacts_are_listed_once() {
        let mut map = ArtifactMap::new();
        map.insert("https://example.com/a", artifact("a.pdf", 2));
        map.insert("https://example.com/b", artifact("a.pdf", 2));
        map.insert("https://example.com/c", artifact("c.pdf", 1));

        assert_eq!(map.len(), 3);
        assert_eq!(
            map.distinct_paths().into_iter().collect::<Vec<_>>(),
            vec![Path::new("a.pdf"), Path::new("c.pdf")]
        );
        assert_eq!(map.get("https://example.com/b"), map.get("https://example.com/a"));
    }
}
