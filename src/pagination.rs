use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::formats::{Article, SectionTree};
use crate::layout::html_escape;
use crate::render::{ArtifactMap, RenderedArtifact};

const INDEX_ENTRIES_PER_PAGE: usize = 45;

pub fn content_sequence<'a>(
    tree: &'a SectionTree,
    artifacts: &'a ArtifactMap,
) -> Vec<(&'a Article, &'a RenderedArtifact)> {
    let mut seen = HashSet::new();
    tree.articles()
        .filter_map(|article| {
            let artifact = artifacts.get(&article.url)?;
            seen.insert(article.url.as_str())
                .then_some((article, artifact))
        })
        .collect()
}

pub fn estimate_index_pages(article_count: usize) -> u32 {
    (article_count / INDEX_ENTRIES_PER_PAGE + 1).max(1) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    cover_pages: u32,
    index_pages: u32,
    content_pages: u32,
    pages: HashMap<String, u32>,
}

impl Pagination {
    pub fn compute(
        tree: &SectionTree,
        artifacts: &ArtifactMap,
        cover_pages: u32,
        index_pages: u32,
    ) -> Self {
        let mut next = cover_pages + index_pages + 1;
        let mut pages = HashMap::new();
        for (article, artifact) in content_sequence(tree, artifacts) {
            pages.insert(article.url.clone(), next);
            next += artifact.page_count;
        }
        Self {
            cover_pages,
            index_pages,
            content_pages: next - (cover_pages + index_pages + 1),
            pages,
        }
    }

    pub fn page_of(&self, url: &str) -> Option<u32> {
        self.pages.get(url).copied()
    }

    pub fn cover_pages(&self) -> u32 {
        self.cover_pages
    }

    pub fn index_pages(&self) -> u32 {
        self.index_pages
    }

    pub fn first_content_page(&self) -> u32 {
        self.cover_pages + self.index_pages + 1
    }

    pub fn total_pages(&self) -> u32 {
        self.cover_pages + self.index_pages + self.content_pages
    }
}

const INDEX_STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Helvetica Neue", sans-serif; color: #1d1d1f; padding: 48px; max-width: 980px; margin: 0 auto; }
h1 { font-size: 40px; font-weight: 600; margin-bottom: 40px; }
ul { list-style: none; padding: 0; margin: 0; }
li { border-bottom: 1px solid #d2d2d7; }
li.section { font-size: 24px; font-weight: 600; padding: 24px 0 8px; border-bottom: none; }
ul.sub-sections { padding-left: 20px; margin-top: 8px; border-top: 1px solid #d2d2d7; }
li.sub-section { font-size: 19px; font-weight: 500; padding: 16px 0 8px; border-bottom: none; }
.entry { display: flex; justify-content: space-between; align-items: center; padding: 12px 0; }
.title { font-size: 17px; }
.page { color: #86868b; font-size: 15px; }
"#;

pub fn render_index_html(tree: &SectionTree, pagination: &Pagination) -> String {
    let mut items = String::new();
    let entry = |items: &mut String, article: &Article| {
        if let Some(page) = pagination.page_of(&article.url) {
            let _ = write!(
                items,
                r#"<li><div class="entry"><span class="title">{}</span><span class="page">{page}</span></div></li>"#,
                html_escape(&article.title)
            );
        }
    };

    for section in &tree.sections {
        if !section.articles().any(|a| pagination.page_of(&a.url).is_some()) {
            continue;
        }
        let _ = write!(items, r#"<li class="section">{}</li>"#, html_escape(&section.title));
        for article in &section.articles {
            entry(&mut items, article);
        }

        let subs = section
            .sub_sections
            .iter()
            .filter(|sub| sub.articles.iter().any(|a| pagination.page_of(&a.url).is_some()))
            .collect::<Vec<_>>();
        if subs.is_empty() {
            continue;
        }
        items.push_str(r#"<ul class="sub-sections">"#);
        for sub in subs {
            let _ = write!(items, r#"<li class="sub-section">{}</li>"#, html_escape(&sub.title));
            for article in &sub.articles {
                entry(&mut items, article);
            }
        }
        items.push_str("</ul>");
    }

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{INDEX_STYLE}</style></head><body><h1>Contents</h1><ul>{items}</ul></body></html>"
    )
}

const COVER_STYLE: &str = r#"
body { margin: 0; padding: 40px; min-height: 100vh; display: flex; justify-content: center; align-items: center; font-family: -apple-system, BlinkMacSystemFont, sans-serif; }
.cover { text-align: center; max-width: 800px; }
h1 { font-size: 48px; font-weight: 500; margin: 0 0 2rem; color: #1d1d1f; }
.subtitle { font-size: 24px; font-weight: 300; color: #86868b; margin: 0; }
"#;

pub fn render_cover_html(title: &str, subtitle: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{COVER_STYLE}</style></head><body><div class=\"cover\"><h1>{}</h1><p class=\"subtitle\">{}</p></div></body></html>",
        html_escape(title),
        html_escape(subtitle)
    )
}
