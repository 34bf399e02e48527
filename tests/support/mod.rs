#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use higbook::browser::{PageDriver, PdfLayout};
use higbook::formats::{Article, Section, SectionTree, SubSection};
use higbook::pdf::OutlineNode;
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::Value;

pub const ORIGIN: &str = "https://developer.apple.com/design/human-interface-guidelines";

pub fn article_url(slug: &str) -> String {
    format!("{ORIGIN}/{slug}")
}

pub fn article(title: &str, slug: &str) -> Article {
    Article {
        title: title.to_owned(),
        url: article_url(slug),
    }
}

pub fn section(title: &str, articles: Vec<Article>) -> Section {
    Section {
        title: title.to_owned(),
        articles,
        sub_sections: Vec::new(),
    }
}

pub fn sub_section(title: &str, articles: Vec<Article>) -> SubSection {
    SubSection {
        title: title.to_owned(),
        articles,
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub text: String,
    pub html: String,
    pub context: Option<String>,
    pub links: Vec<(String, String)>,
    pub pdf_pages: usize,
}

impl FakePage {
    pub fn new(text: &str, pdf_pages: usize) -> Self {
        Self {
            text: text.to_owned(),
            html: format!("<h1>{text}</h1><p>{text}</p>"),
            context: None,
            links: Vec::new(),
            pdf_pages,
        }
    }

    /// Breadcrumb and heading text read during classification.
    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_owned());
        self
    }

    /// Anchors `(href, label)` reported by the link collection script.
    pub fn with_links(mut self, links: &[(&str, &str)]) -> Self {
        self.links = links
            .iter()
            .map(|(href, title)| ((*href).to_owned(), (*title).to_owned()))
            .collect();
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }
}

/// In-memory browser: every known URL loads instantly, prints a blank PDF
/// with the configured page count and answers the extraction scripts.
#[derive(Default)]
pub struct FakeDriver {
    pages: HashMap<String, FakePage>,
    failing: HashSet<String>,
    missing_selectors: HashSet<String>,
    current: Mutex<Option<String>>,
    visited: Mutex<Vec<String>>,
    printed: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, page: FakePage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Navigation to `url` times out.
    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    /// `wait_for_selector(selector)` times out on every page.
    pub fn missing_selector(mut self, selector: impl Into<String>) -> Self {
        self.missing_selectors.insert(selector.into());
        self
    }

    /// Every URL passed to `navigate`, including failed ones.
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// What was printed, in order: article URLs, or `"<html>"` for
    /// documents loaded with `set_content`.
    pub fn printed(&self) -> Vec<String> {
        self.printed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn current_page(&self) -> anyhow::Result<FakePage> {
        let current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .clone();
        match current {
            Some(url) => self
                .pages
                .get(&url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no page for {url}")),
            None => Ok(FakePage::new("", 1)),
        }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()> {
        self.visited
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(url.to_owned());
        if self.failing.contains(url) {
            anyhow::bail!("navigation to {url} timed out after {timeout:?}");
        }
        if !self.pages.contains_key(url) {
            anyhow::bail!("404: {url}");
        }
        *self.current.lock().map_err(|_| anyhow::anyhow!("poisoned"))? = Some(url.to_owned());
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        if self.missing_selectors.contains(selector) {
            anyhow::bail!("selector not found within {timeout:?}: {selector}");
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value> {
        let page = self.current_page()?;
        if script == higbook::scripts::MAIN_TEXT {
            return Ok(Value::String(page.text));
        }
        if script == higbook::scripts::MAIN_HTML {
            return Ok(Value::String(page.html));
        }
        if script.contains("querySelectorAll('a[href]')") {
            let links = page
                .links
                .into_iter()
                .map(|(href, title)| serde_json::json!({ "href": href, "title": title }))
                .collect();
            return Ok(Value::Array(links));
        }
        if script.contains(r#"[aria-expanded="false"]"#) {
            return Ok(Value::from(0));
        }
        if script == higbook::scripts::PAGE_CONTEXT {
            return Ok(page.context.map(Value::String).unwrap_or(Value::Null));
        }
        Ok(Value::Null)
    }

    async fn title(&self) -> anyhow::Result<String> {
        Ok("Human Interface Guidelines | Apple Developer Documentation".to_owned())
    }

    async fn set_content(&self, _html: &str) -> anyhow::Result<()> {
        *self.current.lock().map_err(|_| anyhow::anyhow!("poisoned"))? = None;
        Ok(())
    }

    async fn print_pdf(&self, _layout: &PdfLayout) -> anyhow::Result<Vec<u8>> {
        let current = self
            .current
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .clone();
        let page = self.current_page()?;
        self.printed
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(current.unwrap_or_else(|| "<html>".to_owned()));
        blank_pdf_bytes(page.pdf_pages)
    }

    async fn settle(&self, _duration: Duration) {}
}

pub fn blank_pdf_bytes(pages: usize) -> anyhow::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Reads the outline of the PDF at `path` back into nodes with 1-based pages.
pub fn read_outline(path: &Path) -> anyhow::Result<Vec<OutlineNode>> {
    let doc = Document::load(path)?;
    let page_numbers = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect::<HashMap<_, _>>();
    let catalog = doc.catalog()?;
    let Ok(outlines) = catalog.get(b"Outlines").and_then(Object::as_reference) else {
        return Ok(Vec::new());
    };
    let outlines = doc.get_dictionary(outlines)?;
    read_siblings(&doc, &page_numbers, outlines.get(b"First").ok())
}

fn read_siblings(
    doc: &Document,
    page_numbers: &HashMap<lopdf::ObjectId, u32>,
    first: Option<&Object>,
) -> anyhow::Result<Vec<OutlineNode>> {
    let mut out = Vec::new();
    let mut next = first.and_then(|o| o.as_reference().ok());
    while let Some(id) = next {
        let item = doc.get_dictionary(id)?;
        let title = decode_text(item.get(b"Title")?.as_str()?);
        let dest = match item.get(b"Dest") {
            Ok(dest) => resolve(doc, dest)?,
            Err(_) => {
                let action = resolve(doc, item.get(b"A")?)?.as_dict()?;
                resolve(doc, action.get(b"D")?)?
            }
        };
        let page_ref = dest
            .as_array()?
            .first()
            .ok_or_else(|| anyhow::anyhow!("empty dest"))?
            .as_reference()?;
        let page = *page_numbers
            .get(&page_ref)
            .ok_or_else(|| anyhow::anyhow!("dest is not a page"))?;
        let children = read_siblings(doc, page_numbers, item.get(b"First").ok())?;
        out.push(OutlineNode {
            title,
            page,
            children,
        });
        next = item.get(b"Next").ok().and_then(|o| o.as_reference().ok());
    }
    Ok(out)
}

/// Follows an indirect reference; direct objects are returned as is.
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> anyhow::Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        direct => Ok(direct),
    }
}

fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn tree(sections: Vec<Section>) -> SectionTree {
    SectionTree { sections }
}
