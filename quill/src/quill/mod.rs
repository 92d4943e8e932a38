pub mod collection;
pub mod config;
pub mod feed;
pub mod frontmatter;
pub mod types;

pub use collection::{CollectionSource, ContentCollections};
pub use config::SiteConfig;
pub use feed::{FeedItem, FeedOptions, build_feed, feed_items, post_link, render_rss};
pub use types::BlogPost;
