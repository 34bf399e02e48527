use std::collections::HashSet;
use std::time::Duration;

use crate::browser::{PageDriver, evaluate_as};
use crate::crawl::{CrawlScope, segments_under_root};
use crate::formats::{Article, Link};
use crate::taxonomy::{SectionDef, Taxonomy, title_from_slug};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub top: String,
    pub sub: Option<String>,
}

impl Classification {
    fn top(section: &SectionDef) -> Self {
        Self {
            top: section.name.clone(),
            sub: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SiteRoot,
    SectionOverview,
    SubSectionOverview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePath<'a> {
    segments: Vec<&'a str>,
}

impl<'a> ArticlePath<'a> {
    pub fn parse(href: &'a str, root_path: &str) -> Self {
        Self {
            segments: segments_under_root(href, root_path),
        }
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    fn first(&self) -> Option<&'a str> {
        self.segments.first().copied()
    }

    pub fn skip_reason(&self, taxonomy: &Taxonomy) -> Option<SkipReason> {
        let Some(first) = self.first() else {
            return Some(SkipReason::SiteRoot);
        };
        let section = taxonomy.section_by_slug(first)?;
        match self.segments.len() {
            1 => Some(SkipReason::SectionOverview),
            2 if section.has_sub_sections() => Some(SkipReason::SubSectionOverview),
            _ => None,
        }
    }
}

trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(
        &self,
        taxonomy: &Taxonomy,
        path: &ArticlePath<'_>,
        context: &str,
    ) -> Option<Classification>;
}

struct ContextMatch;

impl Strategy for ContextMatch {
    fn name(&self) -> &'static str {
        "context"
    }

    fn classify(
        &self,
        taxonomy: &Taxonomy,
        _path: &ArticlePath<'_>,
        context: &str,
    ) -> Option<Classification> {
        let context = context.to_lowercase();
        if context.trim().is_empty() {
            return None;
        }
        let section = taxonomy
            .sections
            .iter()
            .find(|section| context.contains(&section.name.to_lowercase()))?;
        let sub = section
            .sub_sections
            .iter()
            .find(|sub| context.contains(&sub.name.to_lowercase()))
            .map(|sub| sub.name.clone());
        Some(Classification {
            top: section.name.clone(),
            sub,
        })
    }
}

struct PathSegment;

impl Strategy for PathSegment {
    fn name(&self) -> &'static str {
        "path"
    }

    fn classify(
        &self,
        taxonomy: &Taxonomy,
        path: &ArticlePath<'_>,
        _context: &str,
    ) -> Option<Classification> {
        if path.segments().len() < 2 {
            return None;
        }
        taxonomy
            .section_by_slug(path.first()?)
            .map(Classification::top)
    }
}

struct FlatArticle;

impl Strategy for FlatArticle {
    fn name(&self) -> &'static str {
        "flat-table"
    }

    fn classify(
        &self,
        taxonomy: &Taxonomy,
        path: &ArticlePath<'_>,
        _context: &str,
    ) -> Option<Classification> {
        let placement = taxonomy.flat_placement(path.first()?)?;
        Some(Classification {
            top: placement.section.name.clone(),
            sub: placement.sub_section.map(|sub| sub.name.clone()),
        })
    }
}

pub struct Classifier<'a> {
    taxonomy: &'a Taxonomy,
    strategies: Vec<Box<dyn Strategy>>,
}

impl<'a> Classifier<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self {
            taxonomy,
            strategies: vec![
                Box::new(ContextMatch),
                Box::new(PathSegment),
                Box::new(FlatArticle),
            ],
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        self.taxonomy
    }

    /// First strategy that answers wins.
    pub fn classify(&self, path: &ArticlePath<'_>, context: &str) -> Option<Classification> {
        let (strategy, mut classification) = self.strategies.iter().find_map(|strategy| {
            strategy
                .classify(self.taxonomy, path, context)
                .map(|c| (strategy.name(), c))
        })?;
        tracing::trace!(strategy, top = %classification.top, "classified");

        if classification.sub.is_none()
            && let Some(section) = self.taxonomy.section_by_name(&classification.top)
            && section.has_sub_sections()
        {
            classification.sub = self.refine_sub_section(section, path);
        }
        Some(classification)
    }

    fn refine_sub_section(&self, section: &SectionDef, path: &ArticlePath<'_>) -> Option<String> {
        let segments = path.segments();
        if segments.len() >= 2 && segments[0] == section.slug {
            let slug = segments[1];
            return Some(
                section
                    .sub_section_by_slug(slug)
                    .map(|sub| sub.name.clone())
                    .unwrap_or_else(|| title_from_slug(slug)),
            );
        }
        let placement = self.taxonomy.flat_placement(path.first()?)?;
        if placement.section.name != section.name {
            return None;
        }
        placement.sub_section.map(|sub| sub.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedArticle {
    pub article: Article,
    pub classification: Classification,
}

pub async fn classify_links<D>(
    driver: &D,
    taxonomy: &Taxonomy,
    links: &[Link],
    timeout: Duration,
) -> Vec<ClassifiedArticle>
where
    D: PageDriver + ?Sized,
{
    let classifier = Classifier::new(taxonomy);
    let scope = CrawlScope::for_taxonomy(taxonomy);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (idx, link) in links.iter().enumerate() {
        let url = match scope.absolute(&link.href) {
            Ok(url) => url.to_string(),
            Err(err) => {
                tracing::warn!(href = %link.href, error = %format!("{err:#}"), "skip link");
                continue;
            }
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let path = ArticlePath::parse(&link.href, taxonomy.root_path());
        if let Some(reason) = path.skip_reason(taxonomy) {
            tracing::debug!(%url, ?reason, "skip landing page");
            continue;
        }

        let context = read_context(driver, &url, timeout).await;
        match classifier.classify(&path, &context) {
            Some(classification) => {
                tracing::debug!(
                    n = idx + 1,
                    total = links.len(),
                    %url,
                    top = %classification.top,
                    sub = classification.sub.as_deref().unwrap_or("-"),
                    "classified link"
                );
                out.push(ClassifiedArticle {
                    article: Article {
                        title: link.title.clone(),
                        url,
                    },
                    classification,
                });
            }
            None => tracing::info!(%url, "dropping unclassifiable link"),
        }
    }

    tracing::info!(articles = out.len(), links = links.len(), "classification finished");
    out
}

async fn read_context<D: PageDriver + ?Sized>(driver: &D, url: &str, timeout: Duration) -> String {
    if let Err(err) = driver.navigate(url, timeout).await {
        tracing::warn!(%url, error = %format!("{err:#}"), "page failed to load; using static tables");
        return String::new();
    }
    match evaluate_as::<String, _>(driver, crate::scripts::PAGE_CONTEXT).await {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(%url, error = %format!("{err:#}"), "read page context; using title");
            driver.title().await.unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/design/human-interface-guidelines/";

    fn classify(taxonomy: &Taxonomy, href: &str, context: &str) -> Option<Classification> {
        let path = ArticlePath::parse(href, ROOT);
        Classifier::new(taxonomy).classify(&path, context)
    }

    fn href(rest: &str) -> String {
        format!("/design/human-interface-guidelines/{rest}")
    }

    #[test]
    fn context_text_wins_over_tables() -> anyhow::Result<()> {
        let taxonomy = Taxonomy::builtin()?;
        let got = classify(&taxonomy, &href("color"), "Patterns\nColor")
            .expect("classified");
        assert_eq!(got.top, "Patterns");
        assert_eq!(got.sub, None);
        Ok(())
    }

    #[test]
    fn context_sub_section_only_counts_for_sub_sectioned_sections() -> anyhow::Result<()> {
        let taxonomy = Taxonomy::builtin()?;
        let got = classify(&taxonomy, &href("gauges"), "COMPONENTS · Status\nGauges")
            .expect("classified");
        assert_eq!(
            got,
            Classification {
                top: "Components".to_owned(),
                sub: Some("Status".to_owned()),
            }
        );

        let got = classify(&taxonomy, &href("layout"), "Foundations\nLayout and Organization")
            .expect("classified");
        assert_eq!(got.top, "Foundations");
        assert_eq!(got.sub, None);
        Ok(())
    }

    #[test]
    fn falls_back_to_path_segment_then_flat_tables() -> anyhow::Result<()> {
        let taxonomy = Taxonomy::builtin()?;

        let got = classify(&taxonomy, &href("components/status/gauges"), "")
            .expect("classified by path");
        assert_eq!(got.top, "Components");
        assert_eq!(got.sub.as_deref(), Some("Status"));

        let got = classify(&taxonomy, &href("components/brand-new-group/widgetry"), "")
            .expect("classified by path");
        assert_eq!(got.sub.as_deref(), Some("Brand New Group"));

        let got = classify(&taxonomy, &href("buttons"), "").expect("classified by table");
        assert_eq!(got.top, "Components");
        assert_eq!(got.sub.as_deref(), Some("Menus and Actions"));

        let got = classify(&taxonomy, &href("dark-mode"), "").expect("classified by table");
        assert_eq!(got.top, "Foundations");

        assert_eq!(classify(&taxonomy, &href("mystery-page"), ""), None);
        Ok(())
    }

    #[test]
    fn components_context_without_sub_uses_flat_table() -> anyhow::Result<()> {
        let taxonomy = Taxonomy::builtin()?;
        let got = classify(&taxonomy, &href("buttons"), "Components\nButtons").expect("classified");
        assert_eq!(got.sub.as_deref(), Some("Menus and Actions"));

        let got = classify(&taxonomy, &href("mystery-control"), "Components").expect("classified");
        assert_eq!(got.top, "Components");
        assert_eq!(got.sub, None);
        Ok(())
    }

    #[test]
    fn overview_pages_are_skipped() -> anyhow::Result<()> {
        let taxonomy = Taxonomy::builtin()?;
        let reason = |rest: &str| {
            let href = href(rest);
            ArticlePath::parse(&href, ROOT).skip_reason(&taxonomy)
        };
        assert_eq!(reason(""), Some(SkipReason::SiteRoot));
        assert_eq!(reason("foundations"), Some(SkipReason::SectionOverview));
        assert_eq!(reason("components/status"), Some(SkipReason::SubSectionOverview));
        assert_eq!(
            reason("human-interface-guidelines/patterns"),
            Some(SkipReason::SectionOverview)
        );
        assert_eq!(reason("foundations/color"), None);
        assert_eq!(reason("color"), None);
        assert_eq!(reason("components/status/gauges"), None);
        Ok(())
    }

    #[test]
    fn classification_is_idempotent() -> anyhow::Result<()> {
        let taxonomy = Taxonomy::builtin()?;
        for (rest, context) in [
            ("gauges", "Components Status"),
            ("color", ""),
            ("components/content/charts", "Charts"),
            ("human-interface-guidelines/typography", ""),
        ] {
            let first = classify(&taxonomy, &href(rest), context);
            let second = classify(&taxonomy, &href(rest), context);
            assert!(first.is_some(), "{rest}");
            assert_eq!(first, second, "{rest}");
        }
        Ok(())
    }
}
