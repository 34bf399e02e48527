use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use url::Url;

const MAX_FILE_STEM_CHARS: usize = 100;

pub const COVER_FILE_NAME: &str = "_cover.pdf";
pub const INDEX_FILE_NAME: &str = "_index.pdf";

pub fn is_front_matter_file_name(name: &OsStr) -> bool {
    name == COVER_FILE_NAME || name == INDEX_FILE_NAME
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.trim().chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "untitled".to_owned()
    } else {
        slug
    }
}

pub fn sanitize_file_stem(text: &str) -> String {
    let cleaned = text
        .chars()
        .filter(|ch| !matches!(ch, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .filter(|ch| !ch.is_control())
        .take(MAX_FILE_STEM_CHARS)
        .collect::<String>();
    cleaned.trim().to_owned()
}

/// `NNNN-<last two path segments>-<title>.pdf`.
pub fn article_pdf_path(out_dir: &Path, sequence: usize, url: &str, title: &str) -> PathBuf {
    let tail = Url::parse(url)
        .ok()
        .map(|url| {
            let segments = url
                .path()
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>();
            let start = segments.len().saturating_sub(2);
            segments[start..].join("-")
        })
        .filter(|tail| !tail.is_empty())
        .unwrap_or_else(|| "article".to_owned());
    let stem = sanitize_file_stem(&format!("{sequence:04}-{tail}-{title}"));
    out_dir.join(format!("{stem}.pdf"))
}

pub fn markdown_dir(section: &str, sub_section: Option<&str>) -> PathBuf {
    let mut dir = PathBuf::from(slugify(section));
    if let Some(sub) = sub_section {
        dir.push(slugify(sub));
    }
    dir
}

pub fn unique_markdown_path(dir: &Path, slug: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let mut candidate = dir.join(format!("{slug}.md"));
    let mut counter = 2_usize;
    while taken.contains(&candidate) {
        candidate = dir.join(format!("{slug}-{counter}.md"));
        counter += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

pub fn portable_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
