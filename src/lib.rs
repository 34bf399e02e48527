#![forbid(unsafe_code)]

pub mod assets;
pub mod browser;
pub mod build;
pub mod classify;
pub mod cli;
pub mod crawl;
pub mod dedup;
pub mod discover;
pub mod export;
pub mod formats;
pub mod layout;
pub mod logging;
pub mod merge;
pub mod pagination;
pub mod pdf;
pub mod render;
pub mod scripts;
pub mod taxonomy;
pub mod tree;
