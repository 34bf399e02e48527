use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt as _;
use serde::de::DeserializeOwned;
use serde_json::Value;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);
const CM_PER_INCH: f64 = 2.54;

#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value>;

    async fn title(&self) -> anyhow::Result<String>;

    async fn set_content(&self, html: &str) -> anyhow::Result<()>;

    async fn print_pdf(&self, layout: &PdfLayout) -> anyhow::Result<Vec<u8>>;

    async fn settle(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub async fn evaluate_as<T, D>(driver: &D, script: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
    D: PageDriver + ?Sized,
{
    let value = driver.evaluate(script).await?;
    serde_json::from_value(value).context("decode script result")
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_cm: f64,
    pub print_background: bool,
    pub header_text: Option<String>,
}

impl PdfLayout {
    pub fn a4() -> Self {
        Self {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_cm: 1.0,
            print_background: true,
            header_text: None,
        }
    }

    pub fn with_header(mut self, header_text: Option<String>) -> Self {
        self.header_text = header_text.filter(|text| !text.trim().is_empty());
        self
    }

    fn margin_in(&self) -> f64 {
        self.margin_cm / CM_PER_INCH
    }

    fn header_template(&self) -> Option<String> {
        self.header_text.as_deref().map(|text| {
            format!(
                r#"<div style="font-size: 8px; width: 100%; text-align: center;">{}</div>"#,
                crate::layout::html_escape(text)
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headful: bool,
    pub chrome_executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headful: false,
            chrome_executable: None,
            window_width: 1200,
            window_height: 800,
        }
    }
}

pub struct ChromeSession {
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
    driver: ChromeDriver,
}

impl ChromeSession {
    pub async fn launch(options: &BrowserOptions) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.window_width, options.window_height)
            .viewport(None);
        if options.headful {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launch chrome")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "browser handler error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("open browser page")?;
        tracing::debug!(headful = options.headful, "browser launched");

        Ok(Self {
            browser,
            handler,
            driver: ChromeDriver { page },
        })
    }

    pub fn driver(&self) -> &ChromeDriver {
        &self.driver
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.browser.close().await.context("close browser")?;
        self.browser.wait().await.context("wait for browser exit")?;
        self.handler.await.context("join browser handler")?;
        Ok(())
    }
}

pub struct ChromeDriver {
    page: Page,
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> anyhow::Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .with_context(|| format!("navigation timed out after {}s: {url}", timeout.as_secs()))?
            .with_context(|| format!("navigate: {url}"))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!(
                    "selector not found within {}s: {selector}",
                    timeout.as_secs()
                );
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("evaluate script")?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn title(&self) -> anyhow::Result<String> {
        let title = self.page.get_title().await.context("read page title")?;
        Ok(title.unwrap_or_default())
    }

    async fn set_content(&self, html: &str) -> anyhow::Result<()> {
        self.page
            .set_content(html)
            .await
            .context("set page content")?;
        Ok(())
    }

    async fn print_pdf(&self, layout: &PdfLayout) -> anyhow::Result<Vec<u8>> {
        let margin = layout.margin_in();
        let mut params = PrintToPdfParams::builder()
            .print_background(layout.print_background)
            .paper_width(layout.paper_width_in)
            .paper_height(layout.paper_height_in)
            .margin_top(margin)
            .margin_bottom(margin)
            .margin_left(margin)
            .margin_right(margin);
        if let Some(header) = layout.header_template() {
            params = params
                .display_header_footer(true)
                .header_template(header)
                .footer_template("<span></span>");
        }

        self.page
            .pdf(params.build())
            .await
            .context("print page to pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_margins_are_converted_to_inches() {
        let layout = PdfLayout::a4();
        assert!((layout.margin_in() - 0.3937).abs() < 0.001);
        assert!(layout.header_template().is_none());
    }

    #[test]
    fn header_text_is_escaped_and_blank_headers_are_dropped() {
        let layout = PdfLayout::a4().with_header(Some("Docs <draft>".to_owned()));
        let header = layout.header_template().expect("header template");
        assert!(header.contains("Docs &lt;draft&gt;"));

        let layout = PdfLayout::a4().with_header(Some("   ".to_owned()));
        assert!(layout.header_text.is_none());
    }
}
