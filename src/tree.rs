use std::collections::HashSet;

use crate::classify::ClassifiedArticle;
use crate::formats::{Article, Section, SectionTree, SubSection};
use crate::taxonomy::Taxonomy;

const SUMMARY_SAMPLE_URLS: usize = 3;

/// Taxonomy order first; unknown sections and sub-sections follow in first-seen order.
pub struct TreeAssembler<'a> {
    taxonomy: &'a Taxonomy,
    seen_urls: HashSet<String>,
    sections: Vec<Section>,
}

impl<'a> TreeAssembler<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self {
            taxonomy,
            seen_urls: HashSet::new(),
            sections: Vec::new(),
        }
    }

    pub fn push(&mut self, classified: ClassifiedArticle) -> bool {
        let ClassifiedArticle {
            article,
            classification,
        } = classified;
        if !self.seen_urls.insert(article.url.clone()) {
            tracing::debug!(url = %article.url, "duplicate article dropped");
            return false;
        }

        let section = self.section_mut(&classification.top);
        match classification.sub {
            Some(sub) => sub_section_mut(section, &sub).articles.push(article),
            None => section.articles.push(article),
        }
        true
    }

    fn section_mut(&mut self, title: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.title == title) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    title: title.to_owned(),
                    articles: Vec::new(),
                    sub_sections: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    pub fn finish(self) -> SectionTree {
        let taxonomy = self.taxonomy;
        let mut sections = self
            .sections
            .into_iter()
            .filter(|s| !s.articles.is_empty() || !s.sub_sections.is_empty())
            .collect::<Vec<_>>();

        // Stable sort keeps first-seen order among unknowns.
        sections.sort_by_key(|s| taxonomy.section_rank(&s.title).unwrap_or(usize::MAX));
        for section in &mut sections {
            if let Some(canonical) = taxonomy.section_by_name(&section.title)
                && canonical.has_sub_sections()
            {
                section
                    .sub_sections
                    .sort_by_key(|sub| canonical.sub_section_rank(&sub.title).unwrap_or(usize::MAX));
            }
        }

        SectionTree { sections }
    }
}

fn sub_section_mut<'s>(section: &'s mut Section, title: &str) -> &'s mut SubSection {
    let idx = match section.sub_sections.iter().position(|s| s.title == title) {
        Some(idx) => idx,
        None => {
            section.sub_sections.push(SubSection {
                title: title.to_owned(),
                articles: Vec::new(),
            });
            section.sub_sections.len() - 1
        }
    };
    &mut section.sub_sections[idx]
}

pub fn assemble(
    taxonomy: &Taxonomy,
    classified: impl IntoIterator<Item = ClassifiedArticle>,
) -> SectionTree {
    let mut assembler = TreeAssembler::new(taxonomy);
    for item in classified {
        assembler.push(item);
    }
    assembler.finish()
}

pub fn log_summary(tree: &SectionTree) {
    tracing::info!(
        sections = tree.sections.len(),
        articles = tree.article_count(),
        "discovered section tree"
    );
    for section in &tree.sections {
        tracing::info!(
            section = %section.title,
            direct = section.articles.len(),
            sub_sections = section.sub_sections.len(),
            samples = ?sample_urls(section.articles.iter()),
            "section"
        );
        for sub in &section.sub_sections {
            tracing::info!(
                section = %section.title,
                sub_section = %sub.title,
                articles = sub.articles.len(),
                samples = ?sample_urls(sub.articles.iter()),
                "sub-section"
            );
        }
    }
}

fn sample_urls<'a>(articles: impl Iterator<Item = &'a Article>) -> Vec<&'a str> {
    articles
        .take(SUMMARY_SAMPLE_URLS)
        .map(|a| a.url.as_str())
        .collect()
}
