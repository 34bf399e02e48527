use std::collections::HashSet;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

const BUILTIN_TAXONOMY: &str = include_str!("taxonomy.yaml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub site: SiteConfig,
    pub sections: Vec<SectionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub origin: Url,
    pub root_path: String,
    pub expected_title: String,
    pub navigator_selector: String,
    pub book_title: String,
    pub book_subtitle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDef {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub articles: Vec<String>,
    #[serde(default)]
    pub sub_sections: Vec<SubSectionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSectionDef {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub articles: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FlatPlacement<'a> {
    pub section: &'a SectionDef,
    pub sub_section: Option<&'a SubSectionDef>,
}

impl Taxonomy {
    pub fn builtin() -> anyhow::Result<Self> {
        Self::parse(BUILTIN_TAXONOMY).context("parse builtin taxonomy")
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read taxonomy: {}", path.display()))?;
        Self::parse(&yaml).with_context(|| format!("parse taxonomy: {}", path.display()))
    }

    pub fn parse(yaml: &str) -> anyhow::Result<Self> {
        let taxonomy: Taxonomy = serde_yaml::from_str(yaml).context("deserialize taxonomy")?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let root = &self.site.root_path;
        if !root.starts_with('/') || !root.ends_with('/') {
            anyhow::bail!("site.root_path must start and end with '/': {root}");
        }
        if self.sections.is_empty() {
            anyhow::bail!("taxonomy must list at least one section");
        }

        let mut names = HashSet::new();
        let mut slugs = HashSet::new();
        for section in &self.sections {
            if !names.insert(section.name.to_lowercase()) {
                anyhow::bail!("duplicate section name: {}", section.name);
            }
            if !slugs.insert(section.slug.as_str()) {
                anyhow::bail!("duplicate section slug: {}", section.slug);
            }
            let mut sub_names = HashSet::new();
            for sub in &section.sub_sections {
                if !sub_names.insert(sub.name.to_lowercase()) {
                    anyhow::bail!(
                        "duplicate sub-section name in {}: {}",
                        section.name,
                        sub.name
                    );
                }
            }
        }
        Ok(())
    }

    pub fn root_path(&self) -> &str {
        &self.site.root_path
    }

    pub fn start_url(&self) -> anyhow::Result<Url> {
        self.site
            .origin
            .join(&self.site.root_path)
            .context("join origin and root path")
    }

    pub fn landing_url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let path = format!("{}{}/", self.site.root_path, segments.join("/"));
        self.site
            .origin
            .join(&path)
            .with_context(|| format!("build landing url for {path}"))
    }

    pub fn section_by_slug(&self, slug: &str) -> Option<&SectionDef> {
        self.sections.iter().find(|s| s.slug == slug)
    }

    pub fn section_by_name(&self, name: &str) -> Option<&SectionDef> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_rank(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    /// Sub-section tables are consulted before section tables.
    pub fn flat_placement(&self, slug: &str) -> Option<FlatPlacement<'_>> {
        for section in &self.sections {
            for sub in &section.sub_sections {
                if sub.articles.iter().any(|a| a == slug) {
                    return Some(FlatPlacement {
                        section,
                        sub_section: Some(sub),
                    });
                }
            }
        }
        self.sections
            .iter()
            .find(|section| section.articles.iter().any(|a| a == slug))
            .map(|section| FlatPlacement {
                section,
                sub_section: None,
            })
    }
}

impl SectionDef {
    pub fn has_sub_sections(&self) -> bool {
        !self.sub_sections.is_empty()
    }

    pub fn sub_section_by_slug(&self, slug: &str) -> Option<&SubSectionDef> {
        self.sub_sections.iter().find(|s| s.slug == slug)
    }

    pub fn sub_section_rank(&self, name: &str) -> Option<usize> {
        self.sub_sections.iter().position(|s| s.name == name)
    }
}

pub fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
