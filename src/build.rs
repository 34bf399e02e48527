use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::browser::{ChromeSession, PageDriver, PdfLayout};
use crate::cli::BuildArgs;
use crate::formats::SectionTree;
use crate::layout::{COVER_FILE_NAME, INDEX_FILE_NAME, sanitize_file_stem};
use crate::merge::FrontMatter;
use crate::pagination::{Pagination, estimate_index_pages, render_cover_html, render_index_html};
use crate::render::{RenderOptions, render_html_page};
use crate::taxonomy::Taxonomy;

const MAX_INDEX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct BookOptions {
    pub out_dir: PathBuf,
    pub output_name: String,
    pub book_title: String,
    pub book_subtitle: String,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
    pub page_header: Option<String>,
}

impl BookOptions {
    pub fn output_path(&self) -> PathBuf {
        let stem = sanitize_file_stem(&self.output_name);
        let stem = if stem.is_empty() { "book".to_owned() } else { stem };
        self.out_dir.join(format!("{stem}.pdf"))
    }
}

pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::load(args.common.taxonomy.as_deref().map(Path::new))?;
    let options = BookOptions {
        out_dir: PathBuf::from(&args.out),
        output_name: args.output_name.clone(),
        book_title: taxonomy.site.book_title.clone(),
        book_subtitle: taxonomy.site.book_subtitle.clone(),
        page_timeout: Duration::from_secs(args.common.page_timeout_secs),
        image_timeout: Duration::from_secs(args.common.image_timeout_secs),
        page_header: args.page_header.clone(),
    };

    let session =
        ChromeSession::launch(&crate::discover::browser_options(&args.common)).await?;
    let result = async {
        let tree = crate::discover::load_or_discover(
            session.driver(),
            &taxonomy,
            &args.common,
            args.tree.as_deref(),
        )
        .await?;
        build_book(session.driver(), &tree, &options).await
    }
    .await;
    if let Err(err) = session.close().await {
        tracing::warn!(error = %format!("{err:#}"), "close browser");
    }

    let path = result?;
    tracing::info!(path = %path.display(), "build finished");
    Ok(())
}

pub async fn build_book<D>(
    driver: &D,
    tree: &SectionTree,
    options: &BookOptions,
) -> anyhow::Result<PathBuf>
where
    D: PageDriver + ?Sized,
{
    if tree.is_empty() {
        anyhow::bail!("section tree has no articles");
    }
    let out = options.output_path();
    if out
        .file_name()
        .is_some_and(crate::layout::is_front_matter_file_name)
    {
        anyhow::bail!(
            "output name {:?} is reserved for an intermediate file",
            options.output_name
        );
    }

    let render_options = RenderOptions {
        out_dir: options.out_dir.clone(),
        page_timeout: options.page_timeout,
        image_timeout: options.image_timeout,
        layout: PdfLayout::a4().with_header(options.page_header.clone()),
    };
    let artifacts = crate::render::render_articles(driver, tree, &render_options)
        .await
        .context("render articles")?;
    if artifacts.is_empty() {
        anyhow::bail!("no article rendered; nothing to merge");
    }
    if artifacts.distinct_paths().contains(out.as_path()) {
        anyhow::bail!("output {} would overwrite a rendered article", out.display());
    }

    let front_layout = PdfLayout::a4();
    let front = FrontMatter {
        cover: options.out_dir.join(COVER_FILE_NAME),
        index: options.out_dir.join(INDEX_FILE_NAME),
    };
    let cover_html = render_cover_html(&options.book_title, &options.book_subtitle);
    let cover_pages = render_html_page(driver, &cover_html, &front_layout, &front.cover)
        .await
        .context("render cover")?;

    let mut index_pages = estimate_index_pages(tree.article_count());
    let mut attempt = 1;
    let pagination = loop {
        let pagination = Pagination::compute(tree, &artifacts, cover_pages, index_pages);
        let index_html = render_index_html(tree, &pagination);
        let measured = render_html_page(driver, &index_html, &front_layout, &front.index)
            .await
            .context("render index")?;
        if measured == index_pages {
            break pagination;
        }
        if attempt >= MAX_INDEX_ATTEMPTS {
            tracing::warn!(
                estimated = index_pages,
                measured,
                "index length did not settle; page numbers in the index may be off"
            );
            break Pagination::compute(tree, &artifacts, cover_pages, measured);
        }
        tracing::debug!(
            attempt,
            estimated = index_pages,
            measured,
            "index length differs from estimate; re-rendering"
        );
        index_pages = measured;
        attempt += 1;
    };
    tracing::info!(
        cover_pages,
        index_pages = pagination.index_pages(),
        total_pages = pagination.total_pages(),
        "pagination computed"
    );

    tokio::task::block_in_place(|| {
        crate::merge::merge_book(tree, &artifacts, &pagination, &front, &out)
    })
    .context("merge book")?;
    Ok(out)
}
