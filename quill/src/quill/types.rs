use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// A single entry of the `blog` collection, parsed and validated by the loader.
#[derive(Clone, Debug, PartialEq)]
pub struct BlogPost {
    pub title: String,
    pub pub_date: DateTime<Utc>,
    pub description: String,
    /// Raw XML fragment appended to the feed item. Empty when the post has none.
    pub custom_data: String,
    pub slug: String,
    pub updated_date: Option<DateTime<Utc>>,
    pub hero_image: Option<String>,
    pub source_path: PathBuf,
}

impl BlogPost {
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        pub_date: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            pub_date,
            description: description.into(),
            custom_data: String::new(),
            slug: slug.into(),
            updated_date: None,
            hero_image: None,
            source_path: PathBuf::new(),
        }
    }

    pub fn with_custom_data(mut self, custom_data: impl Into<String>) -> Self {
        self.custom_data = custom_data.into();
        self
    }
}

/// Collection-relative slug for an entry: path without extension, each segment slugified.
pub fn slug_from_path(path: &Path, collection_root: &Path) -> String {
    path.strip_prefix(collection_root)
        .ok()
        .and_then(|p| p.with_extension("").to_str().map(|s| s.replace('\\', "/")))
        .map(|rel| {
            rel.split('/')
                .map(slugify_segment)
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_else(|| "index".to_string())
}

fn slugify_segment(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('-')
            } else if c.is_alphanumeric() || c == '-' || c == '_' {
                Some(c)
            } else {
                None
            }
        })
        .flat_map(char::to_lowercase)
        .collect()
}
