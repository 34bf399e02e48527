use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::browser::{PageDriver, evaluate_as};
use crate::formats::Link;
use crate::taxonomy::{Taxonomy, title_from_slug};

const STABLE_STEPS: usize = 3;
const SIDEBAR_SCROLL_STEP_PX: i64 = 400;
const SIDEBAR_LABEL_SELECTOR: &str = "p.highlight";
const PAGE_LABEL_SELECTOR: &str = "p.highlight, h2, h3, .card-title";
const CLICK_SETTLE: Duration = Duration::from_millis(60);
const SCROLL_SETTLE: Duration = Duration::from_millis(120);
const PAGE_SCROLL_SETTLE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub start_url: Url,
    pub page_timeout: Duration,
    pub nav_timeout: Duration,
    pub max_scroll_steps: usize,
    pub crawl_landing_pages: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawLink {
    pub href: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct CrawlScope {
    origin: Url,
    root_path: String,
}

impl CrawlScope {
    pub fn new(origin: Url, root_path: &str) -> Self {
        Self {
            origin,
            root_path: trim_trailing_slashes(root_path).to_owned(),
        }
    }

    pub fn for_taxonomy(taxonomy: &Taxonomy) -> Self {
        Self::new(taxonomy.site.origin.clone(), taxonomy.root_path())
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.scheme() == self.origin.scheme()
            && url.host_str() == self.origin.host_str()
            && url.port_or_known_default() == self.origin.port_or_known_default()
    }

    fn is_under_root(&self, path: &str) -> bool {
        self.root_path.is_empty()
            || path == self.root_path
            || path.starts_with(&format!("{}/", self.root_path))
    }

    pub fn normalize_href(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return None;
        }
        let url = self.origin.join(raw).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        if !self.is_same_origin(&url) {
            return None;
        }
        let path = trim_trailing_slashes(url.path());
        let path = if path.is_empty() { "/" } else { path };
        self.is_under_root(path).then(|| path.to_owned())
    }

    pub fn absolute(&self, href: &str) -> anyhow::Result<Url> {
        self.origin
            .join(href)
            .map_err(|err| anyhow::anyhow!("join {href} onto {}: {err}", self.origin))
    }
}

fn trim_trailing_slashes(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// `/docs/docs/x` → `["x"]` for root `/docs/`.
pub fn segments_under_root<'a>(href: &'a str, root_path: &str) -> Vec<&'a str> {
    let root = root_path.trim_matches('/');
    let root_last = root.rsplit('/').next().unwrap_or_default();
    let rest = href
        .trim_matches('/')
        .strip_prefix(root)
        .unwrap_or(href.trim_matches('/'));
    let mut segments = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    while !root_last.is_empty() && segments.first() == Some(&root_last) {
        segments.remove(0);
    }
    segments
}

#[derive(Debug, Clone)]
pub struct LinkSet {
    scope: CrawlScope,
    seen: HashSet<String>,
    links: Vec<Link>,
}

impl LinkSet {
    pub fn new(scope: CrawlScope) -> Self {
        Self {
            scope,
            seen: HashSet::new(),
            links: Vec::new(),
        }
    }

    pub fn insert_raw(&mut self, raw: &RawLink) -> bool {
        let Some(href) = self.scope.normalize_href(&raw.href) else {
            return false;
        };
        let title = match raw.title.trim() {
            "" => href
                .rsplit('/')
                .next()
                .map(title_from_slug)
                .unwrap_or_default(),
            label => label.to_owned(),
        };
        self.insert(Link { href, title })
    }

    pub fn insert(&mut self, link: Link) -> bool {
        if !self.seen.insert(link.href.clone()) {
            return false;
        }
        self.links.push(link);
        true
    }

    pub fn extend(&mut self, links: impl IntoIterator<Item = Link>) -> usize {
        links.into_iter().filter(|link| self.insert(link.clone())).count()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn into_links(self) -> Vec<Link> {
        self.links
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

#[async_trait]
pub trait ScrollSurface: Send {
    async fn reset(&mut self, direction: Direction) -> anyhow::Result<()>;

    async fn expand_collapsed(&mut self) -> anyhow::Result<usize>;

    async fn collect(&mut self) -> anyhow::Result<Vec<RawLink>>;

    async fn scroll(&mut self, direction: Direction) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub steps: usize,
    pub added: usize,
    pub stabilized: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StabilizingCollector {
    pub stable_steps: usize,
    pub max_steps: usize,
}

impl StabilizingCollector {
    pub fn new(max_steps: usize) -> Self {
        Self {
            stable_steps: STABLE_STEPS,
            max_steps: max_steps.max(1),
        }
    }

    /// A step that adds no link is a no-op; `stable_steps` no-ops in a row end the pass.
    pub async fn run_pass<S>(
        &self,
        surface: &mut S,
        direction: Direction,
        links: &mut LinkSet,
    ) -> anyhow::Result<PassReport>
    where
        S: ScrollSurface + ?Sized,
    {
        surface.reset(direction).await?;

        let mut quiet = 0_usize;
        let mut added = 0_usize;
        for step in 1..=self.max_steps {
            let expanded = surface.expand_collapsed().await?;
            if expanded > 0 {
                tracing::trace!(step, expanded, "expanded collapsed nodes");
            }
            let new_links = surface
                .collect()
                .await?
                .iter()
                .filter(|raw| links.insert_raw(raw))
                .count();
            added += new_links;

            if new_links == 0 {
                quiet += 1;
                if quiet >= self.stable_steps {
                    return Ok(PassReport {
                        steps: step,
                        added,
                        stabilized: true,
                    });
                }
            } else {
                quiet = 0;
            }

            surface.scroll(direction).await?;
        }

        tracing::warn!(
            max_steps = self.max_steps,
            added,
            "scroll step ceiling reached before the list stabilized"
        );
        Ok(PassReport {
            steps: self.max_steps,
            added,
            stabilized: false,
        })
    }
}

pub struct SidebarSurface<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    selector: &'a str,
}

impl<'a, D: PageDriver + ?Sized> SidebarSurface<'a, D> {
    pub fn new(driver: &'a D, selector: &'a str) -> Self {
        Self { driver, selector }
    }
}

#[async_trait]
impl<D: PageDriver + ?Sized> ScrollSurface for SidebarSurface<'_, D> {
    async fn reset(&mut self, direction: Direction) -> anyhow::Result<()> {
        let script =
            crate::scripts::scroll_to_edge(Some(self.selector), direction == Direction::Up);
        self.driver.evaluate(&script).await?;
        self.driver.settle(SCROLL_SETTLE).await;
        Ok(())
    }

    async fn expand_collapsed(&mut self) -> anyhow::Result<usize> {
        let script = crate::scripts::expand_collapsed(self.selector);
        let clicked: usize = evaluate_as(self.driver, &script).await?;
        if clicked > 0 {
            self.driver.settle(CLICK_SETTLE * clicked.min(20) as u32).await;
        }
        Ok(clicked)
    }

    async fn collect(&mut self) -> anyhow::Result<Vec<RawLink>> {
        let script = crate::scripts::collect_links(Some(self.selector), SIDEBAR_LABEL_SELECTOR);
        evaluate_as(self.driver, &script).await
    }

    async fn scroll(&mut self, direction: Direction) -> anyhow::Result<()> {
        let delta = match direction {
            Direction::Down => SIDEBAR_SCROLL_STEP_PX,
            Direction::Up => -SIDEBAR_SCROLL_STEP_PX,
        };
        let script = crate::scripts::scroll_by(Some(self.selector), delta);
        self.driver.evaluate(&script).await?;
        self.driver.settle(SCROLL_SETTLE).await;
        Ok(())
    }
}

pub struct PageSurface<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
}

impl<'a, D: PageDriver + ?Sized> PageSurface<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl<D: PageDriver + ?Sized> ScrollSurface for PageSurface<'_, D> {
    async fn reset(&mut self, _direction: Direction) -> anyhow::Result<()> {
        self.driver
            .evaluate(&crate::scripts::scroll_to_edge(None, false))
            .await?;
        Ok(())
    }

    async fn expand_collapsed(&mut self) -> anyhow::Result<usize> {
        Ok(0)
    }

    async fn collect(&mut self) -> anyhow::Result<Vec<RawLink>> {
        let script = crate::scripts::collect_links(None, PAGE_LABEL_SELECTOR);
        evaluate_as(self.driver, &script).await
    }

    async fn scroll(&mut self, _direction: Direction) -> anyhow::Result<()> {
        self.driver
            .evaluate(&crate::scripts::scroll_by(None, 0))
            .await?;
        self.driver.settle(PAGE_SCROLL_SETTLE).await;
        Ok(())
    }
}

pub async fn discover_links<D>(
    driver: &D,
    taxonomy: &Taxonomy,
    options: &CrawlOptions,
) -> Vec<Link>
where
    D: PageDriver + ?Sized,
{
    let scope = CrawlScope::for_taxonomy(taxonomy);
    let collector = StabilizingCollector::new(options.max_scroll_steps);
    let mut links = LinkSet::new(scope.clone());

    let start_url = options.start_url.as_str();
    tracing::info!(url = %start_url, "loading start page");
    let sidebar_found = match driver.navigate(start_url, options.page_timeout).await {
        Ok(()) => {
            check_title(driver, &taxonomy.site.expected_title).await;
            match driver
                .wait_for_selector(&taxonomy.site.navigator_selector, options.nav_timeout)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        selector = %taxonomy.site.navigator_selector,
                        error = %format!("{err:#}"),
                        "navigator not found; falling back to landing pages"
                    );
                    false
                }
            }
        }
        Err(err) => {
            tracing::warn!(
                url = %start_url,
                error = %format!("{err:#}"),
                "start page failed to load; falling back to landing pages"
            );
            false
        }
    };

    if sidebar_found {
        crawl_sidebar(driver, &taxonomy.site.navigator_selector, &collector, &mut links).await;
    }
    if !sidebar_found || options.crawl_landing_pages {
        crawl_landing_pages(driver, taxonomy, options, &collector, &mut links).await;
    }

    tracing::info!(links = links.len(), "navigation crawl finished");
    links.into_links()
}

async fn check_title<D: PageDriver + ?Sized>(driver: &D, expected: &str) {
    match driver.title().await {
        Ok(title) if title.contains(expected) => {}
        Ok(title) => tracing::warn!(%title, %expected, "unexpected start page title"),
        Err(err) => tracing::debug!(error = %format!("{err:#}"), "read start page title"),
    }
}

async fn crawl_sidebar<D: PageDriver + ?Sized>(
    driver: &D,
    selector: &str,
    collector: &StabilizingCollector,
    links: &mut LinkSet,
) {
    let mut surface = SidebarSurface::new(driver, selector);
    for (pass, direction) in [Direction::Down, Direction::Up, Direction::Down]
        .into_iter()
        .enumerate()
    {
        match collector.run_pass(&mut surface, direction, links).await {
            Ok(report) => tracing::info!(
                pass = pass + 1,
                ?direction,
                steps = report.steps,
                added = report.added,
                total = links.len(),
                "sidebar pass finished"
            ),
            Err(err) => tracing::warn!(
                pass = pass + 1,
                ?direction,
                error = %format!("{err:#}"),
                "sidebar pass failed"
            ),
        }
    }
}

async fn crawl_landing_pages<D: PageDriver + ?Sized>(
    driver: &D,
    taxonomy: &Taxonomy,
    options: &CrawlOptions,
    collector: &StabilizingCollector,
    links: &mut LinkSet,
) {
    for section in &taxonomy.sections {
        let Some(page_links) =
            crawl_landing_page(driver, taxonomy, &[&section.slug], options, collector).await
        else {
            continue;
        };

        let mut sub_slugs: Vec<String> = Vec::new();
        if section.has_sub_sections() {
            for link in &page_links {
                let segments = segments_under_root(&link.href, taxonomy.root_path());
                if let [first, sub] = segments.as_slice()
                    && *first == section.slug
                    && !sub_slugs.iter().any(|s| s.as_str() == *sub)
                {
                    sub_slugs.push((*sub).to_owned());
                }
            }
            for sub in &section.sub_sections {
                if !sub_slugs.contains(&sub.slug) {
                    sub_slugs.push(sub.slug.clone());
                }
            }
        }
        links.extend(page_links);

        for sub_slug in &sub_slugs {
            if let Some(sub_links) = crawl_landing_page(
                driver,
                taxonomy,
                &[&section.slug, sub_slug],
                options,
                collector,
            )
            .await
            {
                links.extend(sub_links);
            }
        }
    }
}

async fn crawl_landing_page<D: PageDriver + ?Sized>(
    driver: &D,
    taxonomy: &Taxonomy,
    segments: &[&str],
    options: &CrawlOptions,
    collector: &StabilizingCollector,
) -> Option<Vec<Link>> {
    let url = match taxonomy.landing_url(segments) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "skip landing page");
            return None;
        }
    };
    if let Err(err) = driver.navigate(url.as_str(), options.page_timeout).await {
        tracing::warn!(url = %url, error = %format!("{err:#}"), "landing page failed to load");
        return None;
    }

    let mut page_links = LinkSet::new(CrawlScope::for_taxonomy(taxonomy));
    let mut surface = PageSurface::new(driver);
    match collector
        .run_pass(&mut surface, Direction::Down, &mut page_links)
        .await
    {
        Ok(report) => tracing::info!(
            url = %url,
            steps = report.steps,
            links = page_links.len(),
            "landing page crawled"
        ),
        Err(err) => tracing::warn!(
            url = %url,
            error = %format!("{err:#}"),
            "landing page crawl interrupted"
        ),
    }
    Some(page_links.into_links())
}
