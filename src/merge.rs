use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::formats::{Article, SectionTree};
use crate::pagination::{Pagination, content_sequence};
use crate::pdf::OutlineNode;
use crate::render::ArtifactMap;

#[derive(Debug, Clone)]
pub struct FrontMatter {
    pub cover: PathBuf,
    pub index: PathBuf,
}

pub fn build_outline(tree: &SectionTree, pagination: &Pagination) -> Vec<OutlineNode> {
    let mut seen = HashSet::new();
    let mut leaves = |articles: &[Article]| -> Vec<OutlineNode> {
        articles
            .iter()
            .filter_map(|article| {
                let page = pagination.page_of(&article.url)?;
                seen.insert(article.url.clone())
                    .then(|| OutlineNode::leaf(article.title.clone(), page))
            })
            .collect()
    };

    let mut outline = Vec::new();
    for section in &tree.sections {
        let mut children = leaves(&section.articles);
        for sub in &section.sub_sections {
            let sub_children = leaves(&sub.articles);
            if let Some(first) = sub_children.first() {
                children.push(OutlineNode {
                    title: sub.title.clone(),
                    page: first.page,
                    children: sub_children,
                });
            }
        }
        if let Some(first) = children.first() {
            outline.push(OutlineNode {
                title: section.title.clone(),
                page: first.page,
                children,
            });
        }
    }
    outline
}

pub fn merge_book(
    tree: &SectionTree,
    artifacts: &ArtifactMap,
    pagination: &Pagination,
    front: &FrontMatter,
    out: &Path,
) -> anyhow::Result<()> {
    if artifacts.is_empty() {
        anyhow::bail!("no rendered articles to merge");
    }

    let mut parts = vec![front.cover.clone(), front.index.clone()];
    parts.extend(
        content_sequence(tree, artifacts)
            .into_iter()
            .map(|(_, artifact)| artifact.path.clone()),
    );
    let outline = build_outline(tree, pagination);

    let pages = crate::pdf::merge(&parts, &outline, out)?;
    if pages != pagination.total_pages() {
        tracing::warn!(
            merged = pages,
            expected = pagination.total_pages(),
            "merged page count differs from pagination"
        );
    }
    tracing::info!(path = %out.display(), pages, "book written");

    let mut intermediates = artifacts.distinct_paths();
    intermediates.insert(front.cover.as_path());
    intermediates.insert(front.index.as_path());
    remove_intermediates(intermediates);
    Ok(())
}

fn remove_intermediates<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), %err, "remove intermediate file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Section, SubSection};
    use crate::render::RenderedArtifact;

    fn article(name: &str) -> Article {
        Article {
            title: name.to_owned(),
            url: format!("https://example.com/{name}"),
        }
    }

    #[test]
    fn outline_mirrors_tree_and_drops_unrendered_nodes() {
        let tree = SectionTree {
            sections: vec![
                Section {
                    title: "Foundations".to_owned(),
                    articles: vec![article("skipped")],
                    sub_sections: Vec::new(),
                },
                Section {
                    title: "Components".to_owned(),
                    articles: vec![article("loose")],
                    sub_sections: vec![
                        SubSection {
                            title: "Empty".to_owned(),
                            articles: vec![article("also-skipped")],
                        },
                        SubSection {
                            title: "Status".to_owned(),
                            articles: vec![article("gauges"), article("rings")],
                        },
                    ],
                },
            ],
        };
        let mut map = ArtifactMap::new();
        for (name, pages) in [("loose", 2), ("gauges", 3), ("rings", 1)] {
            map.insert(
                format!("https://example.com/{name}"),
                RenderedArtifact {
                    path: PathBuf::from(format!("{name}.pdf")),
                    page_count: pages,
                },
            );
        }
        let pagination = Pagination::compute(&tree, &map, 1, 1);
        let outline = build_outline(&tree, &pagination);

        assert_eq!(
            outline,
            vec![OutlineNode {
                title: "Components".to_owned(),
                page: 3,
                children: vec![
                    OutlineNode::leaf("loose", 3),
                    OutlineNode {
                        title: "Status".to_owned(),
                        page: 5,
                        children: vec![OutlineNode::leaf("gauges", 5), OutlineNode::leaf("rings", 8)],
                    },
                ],
            }]
        );
    }

    #[test]
    fn empty_artifact_map_writes_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("book.pdf");
        let tree = SectionTree::default();
        let artifacts = ArtifactMap::new();
        let pagination = Pagination::compute(&tree, &artifacts, 1, 1);
        let front = FrontMatter {
            cover: dir.path().join("_cover.pdf"),
            index: dir.path().join("_index.pdf"),
        };

        let err = merge_book(&tree, &artifacts, &pagination, &front, &out).unwrap_err();
        assert!(err.to_string().contains("no rendered articles"));
        assert!(!out.exists());
        Ok(())
    }
}
