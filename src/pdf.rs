use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use lopdf::{Bookmark, Document, Object, ObjectId};

const OUTLINE_COLOR: [f32; 3] = [0.0, 0.0, 0.0];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub title: String,
    pub page: u32,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn leaf(title: impl Into<String>, page: u32) -> Self {
        Self {
            title: title.into(),
            page,
            children: Vec::new(),
        }
    }
}

pub fn page_count(path: &Path) -> anyhow::Result<u32> {
    let document =
        Document::load(path).with_context(|| format!("load pdf: {}", path.display()))?;
    Ok(document.get_pages().len() as u32)
}

pub fn page_count_of_bytes(bytes: &[u8]) -> anyhow::Result<u32> {
    let document = Document::load_mem(bytes).context("parse pdf bytes")?;
    Ok(document.get_pages().len() as u32)
}

/// Written to a temporary file next to `out`, then renamed into place.
pub fn merge(parts: &[PathBuf], outline: &[OutlineNode], out: &Path) -> anyhow::Result<u32> {
    if parts.is_empty() {
        anyhow::bail!("nothing to merge");
    }

    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects = Vec::new();
    for part in parts {
        let mut document =
            Document::load(part).with_context(|| format!("load pdf: {}", part.display()))?;
        document.renumber_objects_with(max_id);
        max_id = document.max_id + 1;

        for page_id in document.get_pages().into_values() {
            let page = document
                .get_object(page_id)
                .with_context(|| format!("read page object in {}", part.display()))?
                .to_owned();
            pages.push((page_id, page));
        }
        objects.extend(document.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut pages_root: Option<(ObjectId, lopdf::Dictionary)> = None;
    for (id, object) in objects {
        match type_name(&object) {
            Some(b"Catalog") => {
                if catalog.is_none() {
                    catalog = Some((id, object));
                }
            }
            Some(b"Pages") => {
                if pages_root.is_none()
                    && let Ok(dict) = object.as_dict()
                {
                    pages_root = Some((id, dict.clone()));
                }
            }
            Some(b"Page" | b"Outlines" | b"Outline") => {}
            _ => {
                merged.objects.insert(id, object);
            }
        }
    }
    let (catalog_id, catalog) = catalog.context("no catalog in merged parts")?;
    let (pages_id, mut pages_dict) = pages_root.context("no page tree in merged parts")?;

    let page_total = pages.len() as u32;
    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, page) in pages {
        let mut dict = page
            .as_dict()
            .context("page object is not a dictionary")?
            .clone();
        dict.set("Parent", pages_id);
        merged.objects.insert(page_id, Object::Dictionary(dict));
        kids.push(Object::Reference(page_id));
    }
    pages_dict.set("Kids", kids);
    pages_dict.set("Count", i64::from(page_total));
    merged
        .objects
        .insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = catalog
        .as_dict()
        .context("catalog object is not a dictionary")?
        .clone();
    catalog.set("Pages", pages_id);
    catalog.remove(b"Outlines");
    merged
        .objects
        .insert(catalog_id, Object::Dictionary(catalog));
    merged.trailer.set("Root", catalog_id);

    merged.max_id = merged.objects.keys().map(|(id, _)| *id).max().unwrap_or(0);
    merged.renumber_objects();

    attach_outline(&mut merged, outline)?;
    merged.compress();
    write_atomically(&mut merged, out)?;
    Ok(page_total)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

fn attach_outline(document: &mut Document, outline: &[OutlineNode]) -> anyhow::Result<()> {
    if outline.is_empty() {
        return Ok(());
    }
    let page_ids = document.get_pages();
    for node in outline {
        add_bookmark(document, &page_ids, node, None)?;
    }

    let Some(outline_id) = document.build_outline() else {
        return Ok(());
    };
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .context("merged document has no root")?;
    let catalog = document
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .context("read merged catalog")?;
    catalog.set("Outlines", Object::Reference(outline_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));
    Ok(())
}

fn add_bookmark(
    document: &mut Document,
    page_ids: &std::collections::BTreeMap<u32, ObjectId>,
    node: &OutlineNode,
    parent: Option<u32>,
) -> anyhow::Result<()> {
    let page_id = *page_ids.get(&node.page).with_context(|| {
        format!(
            "outline entry {:?} points at page {} of {}",
            node.title,
            node.page,
            page_ids.len()
        )
    })?;
    let id = document.add_bookmark(
        Bookmark::new(node.title.clone(), OUTLINE_COLOR, 0, page_id),
        parent,
    );
    for child in &node.children {
        add_bookmark(document, page_ids, child, Some(id))?;
    }
    Ok(())
}

fn write_atomically(document: &mut Document, out: &Path) -> anyhow::Result<()> {
    let dir = out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output dir: {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".higbook-")
        .suffix(".pdf.part")
        .tempfile_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    document
        .save_to(tmp.as_file_mut())
        .context("write merged pdf")?;
    tmp.as_file_mut().flush().context("flush merged pdf")?;
    tmp.persist(out)
        .map_err(|err| err.error)
        .with_context(|| format!("persist merged pdf: {}", out.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use lopdf::{Stream, dictionary};

    use super::*;

    fn blank_pdf(path: &Path, pages: usize) -> anyhow::Result<()> {
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
        doc.save(path)?;
        Ok(())
    }

    #[test]
    fn merged_page_count_is_the_sum_of_parts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut parts = Vec::new();
        for (idx, pages) in [1_usize, 3, 2].into_iter().enumerate() {
            let path = dir.path().join(format!("part-{idx}.pdf"));
            blank_pdf(&path, pages)?;
            assert_eq!(page_count(&path)?, pages as u32);
            parts.push(path);
        }

        let out = dir.path().join("book.pdf");
        let outline = vec![OutlineNode {
            title: "Section".to_owned(),
            page: 2,
            children: vec![OutlineNode::leaf("Article", 5)],
        }];
        let total = merge(&parts, &outline, &out)?;

        assert_eq!(total, 6);
        assert_eq!(page_count(&out)?, 6);
        let bytes = std::fs::read(&out)?;
        assert_eq!(page_count_of_bytes(&bytes)?, 6);
        Ok(())
    }

    #[test]
    fn outline_past_the_last_page_fails_without_writing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let part = dir.path().join("only.pdf");
        blank_pdf(&part, 1)?;
        let out = dir.path().join("book.pdf");

        let err = merge(&[part], &[OutlineNode::leaf("Missing", 9)], &out).unwrap_err();
        assert!(format!("{err:#}").contains("page 9"), "{err:#}");
        assert!(!out.exists());

        let leftovers = std::fs::read_dir(dir.path())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }

    #[test]
    fn merge_of_nothing_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("book.pdf");
        assert!(merge(&[], &[], &out).is_err());
        assert!(!out.exists());
    }
}
