use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::debug;
use walkdir::{DirEntry, WalkDir};

use crate::quill::frontmatter::parse_blog_frontmatter;
use crate::quill::types::{BlogPost, slug_from_path};

/// Source of named content collections.
pub trait CollectionSource: Send + Sync {
    fn get_collection(&self, name: &str) -> Result<Vec<BlogPost>>;
}

/// Collections stored as directories of markdown files under a content root.
#[derive(Debug, Clone)]
pub struct ContentCollections {
    content_root: PathBuf,
}

impl ContentCollections {
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
        }
    }

    fn load_entry(&self, path: &Path, collection_root: &Path) -> Result<BlogPost> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading markdown at {}", path.display()))?;
        let fm = parse_blog_frontmatter(&content)
            .with_context(|| format!("invalid blog entry {}", path.display()))?;

        let slug = fm
            .slug
            .unwrap_or_else(|| slug_from_path(path, collection_root));

        Ok(BlogPost {
            title: fm.title,
            pub_date: fm.pub_date,
            description: fm.description,
            custom_data: fm.custom_data.unwrap_or_default(),
            slug,
            updated_date: fm.updated_date,
            hero_image: fm.hero_image,
            source_path: path.to_path_buf(),
        })
    }
}

impl CollectionSource for ContentCollections {
    /// Entries are yielded in file-path order.
    fn get_collection(&self, name: &str) -> Result<Vec<BlogPost>> {
        let collection_root = self.content_root.join(name);
        if !collection_root.is_dir() {
            bail!(
                "collection \"{name}\" does not exist at {}",
                collection_root.display()
            );
        }

        let mut posts = vec![];
        for entry in WalkDir::new(&collection_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_underscored(e))
        {
            let entry = entry
                .with_context(|| format!("walking collection {}", collection_root.display()))?;
            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }
            posts.push(self.load_entry(entry.path(), &collection_root)?);
        }

        debug!("loaded {} entries from collection {name}", posts.len());
        Ok(posts)
    }
}

fn is_underscored(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('_'))
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("mdx"))
        .unwrap_or(false)
}
