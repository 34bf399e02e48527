use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
use sha2::{Digest as _, Sha256};
use url::Url;

pub const ASSETS_DIR_NAME: &str = "_assets";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome Safari";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";
const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "svg", "tif", "tiff", "avif"];
const DEFAULT_EXTENSION: &str = "png";

static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("valid regex"));

pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build image http client")?;
        Ok(Self { client })
    }

    pub async fn download(
        &self,
        url: &Url,
        referer: &str,
        name_seed: &str,
        dest_dir: &Path,
    ) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, IMAGE_ACCEPT)
            .header(REFERER, referer)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("read body of {url}"))?;

        let file_name = format!(
            "{}.{}",
            asset_stem(name_seed, url),
            infer_extension(url, content_type.as_deref())
        );
        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("create asset dir: {}", dest_dir.display()))?;
        let path = dest_dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(file_name)
    }
}

fn asset_stem(name_seed: &str, url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name_seed.as_bytes());
    hasher.update(b":");
    hasher.update(url.as_str().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

pub fn infer_extension(url: &Url, content_type: Option<&str>) -> String {
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()));
    if let Some(ext) = from_path {
        return ext;
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    let from_mime = match mime.as_deref() {
        Some("image/png") => Some("png"),
        Some("image/jpeg" | "image/jpg") => Some("jpg"),
        Some("image/gif") => Some("gif"),
        Some("image/webp") => Some("webp"),
        Some("image/svg+xml") => Some("svg"),
        Some("image/avif") => Some("avif"),
        Some("image/tiff") => Some("tiff"),
        _ => None,
    };
    from_mime.unwrap_or(DEFAULT_EXTENSION).to_owned()
}

pub fn image_sources(html: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for captures in IMG_SRC.captures_iter(html) {
        let src = &captures[1];
        if !out.iter().any(|s| s == src) {
            out.push(src.to_owned());
        }
    }
    out
}

pub async fn localize_images(
    fetcher: &AssetFetcher,
    html: &str,
    page_url: &Url,
    article_dir: &Path,
    article_slug: &str,
) -> String {
    let dest_dir = article_dir.join(ASSETS_DIR_NAME).join(article_slug);
    let mut replacements: HashMap<String, String> = HashMap::new();
    let mut downloaded = 0_usize;

    for src in image_sources(html) {
        if src.starts_with("data:") {
            continue;
        }
        let Ok(absolute) = page_url.join(&src) else {
            tracing::debug!(%src, "unresolvable image src");
            continue;
        };
        match fetcher
            .download(&absolute, page_url.as_str(), article_slug, &dest_dir)
            .await
        {
            Ok(file_name) => {
                downloaded += 1;
                replacements.insert(
                    src,
                    format!("{ASSETS_DIR_NAME}/{article_slug}/{file_name}"),
                );
            }
            Err(err) => {
                tracing::warn!(url = %absolute, error = %format!("{err:#}"), "image download failed");
                replacements.insert(src, absolute.to_string());
            }
        }
    }
    if downloaded > 0 {
        tracing::debug!(images = downloaded, dir = %dest_dir.display(), "images saved");
    }

    IMG_SRC
        .replace_all(html, |captures: &regex::Captures<'_>| {
            let (Some(tag), Some(src)) = (captures.get(0), captures.get(1)) else {
                return String::new();
            };
            match replacements.get(src.as_str()) {
                Some(local) => {
                    let text = tag.as_str();
                    let start = src.start() - tag.start();
                    let end = src.end() - tag.start();
                    format!("{}{local}{}", &text[..start], &text[end..])
                }
                None => tag.as_str().to_owned(),
            }
        })
        .into_owned()
}
