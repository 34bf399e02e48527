use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSection {
    pub title: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub sub_sections: Vec<SubSection>,
}

impl Section {
    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.articles
            .iter()
            .chain(self.sub_sections.iter().flat_map(|sub| sub.articles.iter()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTree {
    pub sections: Vec<Section>,
}

impl SectionTree {
    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.sections.iter().flat_map(Section::articles)
    }

    pub fn placed_articles(&self) -> Vec<PlacedArticle<'_>> {
        let mut out = Vec::new();
        for section in &self.sections {
            for article in &section.articles {
                out.push(PlacedArticle {
                    section: &section.title,
                    sub_section: None,
                    article,
                });
            }
            for sub in &section.sub_sections {
                for article in &sub.articles {
                    out.push(PlacedArticle {
                        section: &section.title,
                        sub_section: Some(&sub.title),
                        article,
                    });
                }
            }
        }
        out
    }

    pub fn article_count(&self) -> usize {
        self.articles().count()
    }

    pub fn is_empty(&self) -> bool {
        self.article_count() == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlacedArticle<'a> {
    pub section: &'a str,
    pub sub_section: Option<&'a str>,
    pub article: &'a Article,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownFrontMatter {
    pub title: String,
    pub source_url: String,
    pub section: String,
    pub sub_section: Option<String>,
    pub slug: String,
    pub fetched_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub front_matter: MarkdownFrontMatter,
    pub relative_path: String,
    pub bytes: u64,
    pub content_hash: String,
}
