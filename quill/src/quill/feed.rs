//! RSS feed for the `blog` collection.
//!
//! Each post maps one-to-one onto a [`FeedItem`] in collection order. The
//! item link is the post route, `/blog/<slug>/`, and is resolved against the
//! site origin only when the channel is serialized.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rss::extension::{Extension, ExtensionMap};
use rss::validation::Validate;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};
use url::Url;

use crate::quill::collection::CollectionSource;
use crate::quill::config::SiteConfig;
use crate::quill::types::BlogPost;

pub const BLOG_COLLECTION: &str = "blog";

const CUSTOM_DATA_KEY: &str = "customData";

#[derive(Clone, Debug, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub pub_date: DateTime<Utc>,
    pub description: String,
    pub custom_data: String,
    pub link: String,
}

impl From<&BlogPost> for FeedItem {
    fn from(post: &BlogPost) -> Self {
        Self {
            title: post.title.clone(),
            pub_date: post.pub_date,
            description: post.description.clone(),
            custom_data: post.custom_data.clone(),
            link: post_link(&post.slug),
        }
    }
}

/// Channel-level fields of the feed.
#[derive(Clone, Debug)]
pub struct FeedOptions {
    pub title: String,
    pub description: String,
    /// Canonical site origin; item links are resolved against it.
    pub site: String,
    pub language: Option<String>,
    pub xmlns: BTreeMap<String, String>,
}

impl FeedOptions {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        site: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            site: site.into(),
            language: None,
            xmlns: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.site_title.clone(),
            description: config.site_description.clone(),
            site: config.site.clone(),
            language: config.feed.language.clone(),
            xmlns: config.feed.xmlns.clone(),
        }
    }
}

/// Route of a rendered post. The slug is interpolated as-is.
pub fn post_link(slug: &str) -> String {
    format!("/blog/{slug}/")
}

pub fn feed_items(posts: &[BlogPost]) -> Vec<FeedItem> {
    posts.iter().map(FeedItem::from).collect()
}

/// Load the `blog` collection and render it as an RSS document.
pub fn build_feed(config: &SiteConfig, source: &dyn CollectionSource) -> Result<String> {
    let posts = source
        .get_collection(BLOG_COLLECTION)
        .context("loading blog collection")?;
    let items = feed_items(&posts);
    render_rss(&FeedOptions::from_config(config), &items)
}

pub fn render_rss(options: &FeedOptions, items: &[FeedItem]) -> Result<String> {
    let site = Url::parse(&options.site)
        .with_context(|| format!("invalid site url `{}`", options.site))?;

    let items = items
        .iter()
        .map(|item| to_rss_item(item, &site))
        .collect::<Result<Vec<_>>>()?;

    let channel = ChannelBuilder::default()
        .title(options.title.clone())
        .link(options.site.clone())
        .description(options.description.clone())
        .language(options.language.clone())
        .namespaces(options.xmlns.clone())
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("RSS validation failed: {e}"))?;
    Ok(channel.to_string())
}

fn to_rss_item(item: &FeedItem, site: &Url) -> Result<rss::Item> {
    let link = site
        .join(&item.link)
        .with_context(|| format!("resolving feed link `{}`", item.link))?
        .to_string();

    let extensions = custom_data_extensions(&item.custom_data)
        .with_context(|| format!("invalid customData for `{}`", item.title))?;

    Ok(ItemBuilder::default()
        .title(item.title.clone())
        .link(Some(link.clone()))
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .description(item.description.clone())
        .pub_date(item.pub_date.to_rfc2822())
        .extensions(extensions)
        .build())
}

fn custom_data_extensions(raw: &str) -> Result<ExtensionMap> {
    let mut map = ExtensionMap::new();
    if raw.trim().is_empty() {
        return Ok(map);
    }

    let elements = parse_fragment(raw)?;
    map.insert(CUSTOM_DATA_KEY.to_string(), ordered(elements));
    Ok(map)
}

/// Sibling order is kept by keying each element on its position.
fn ordered(elements: Vec<Extension>) -> BTreeMap<String, Vec<Extension>> {
    elements
        .into_iter()
        .enumerate()
        .map(|(idx, ext)| (format!("{idx:08}"), vec![ext]))
        .collect()
}

/// Parse an XML fragment (possibly several sibling elements) into extension trees.
///
/// Element text is kept unchanged. An element may hold text or child elements but
/// not both, since an extension writes its value ahead of its children;
/// whitespace between child elements is dropped. Comments and processing
/// instructions are not carried into the feed.
fn parse_fragment(raw: &str) -> Result<Vec<Extension>> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(false);

    let mut roots = vec![];
    let mut stack: Vec<Extension> = vec![];

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let ext = open_element(&start)?;
                attach(&mut stack, &mut roots, ext);
            }
            Event::End(_) => {
                let ext = close_element(stack.pop().context("unexpected closing tag")?)?;
                attach(&mut stack, &mut roots, ext);
            }
            Event::Text(text) => push_text(&mut stack, &text.unescape()?)?,
            Event::CData(cdata) => {
                push_text(&mut stack, &String::from_utf8_lossy(&cdata.into_inner()))?
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        bail!("unclosed element <{}>", open.name);
    }
    Ok(roots)
}

fn open_element(start: &BytesStart) -> Result<Extension> {
    let name = String::from_utf8(start.name().as_ref().to_vec())?;
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        attrs.insert(key, attr.unescape_value()?.into_owned());
    }

    Ok(Extension {
        name,
        attrs,
        ..Extension::default()
    })
}

fn close_element(mut ext: Extension) -> Result<Extension> {
    if ext.children.is_empty() {
        return Ok(ext);
    }
    match ext.value.take() {
        Some(text) if !text.trim().is_empty() => {
            bail!("<{}> mixes text and child elements", ext.name)
        }
        _ => Ok(ext),
    }
}

fn attach(stack: &mut [Extension], roots: &mut Vec<Extension>, ext: Extension) {
    match stack.last_mut() {
        Some(parent) => {
            let key = format!("{:08}", parent.children.len());
            parent.children.insert(key, vec![ext]);
        }
        None => roots.push(ext),
    }
}

fn push_text(stack: &mut [Extension], text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let Some(current) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        bail!("text outside of an element: `{text}`");
    };
    current.value.get_or_insert_with(String::new).push_str(text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rss::Channel;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn options() -> FeedOptions {
        FeedOptions::new("My Blog", "desc", "https://chrlschn.dev")
    }

    struct StaticCollection(Vec<BlogPost>);

    impl CollectionSource for StaticCollection {
        fn get_collection(&self, name: &str) -> Result<Vec<BlogPost>> {
            if name != BLOG_COLLECTION {
                bail!("collection \"{name}\" does not exist");
            }
            Ok(self.0.clone())
        }
    }

    #[test]
    fn link_is_blog_route_with_trailing_slash() {
        assert_eq!(post_link("hi"), "/blog/hi/");
        assert_eq!(post_link("2023/new-year"), "/blog/2023/new-year/");
    }

    #[test]
    fn empty_slug_is_interpolated_as_is() {
        // Slugs are neither validated nor sanitized before interpolation.
        assert_eq!(post_link(""), "/blog//");
    }

    #[test]
    fn items_follow_collection_order() {
        let posts = vec![
            BlogPost::new("zeta", "Zeta", "z", date(2023, 3, 1)),
            BlogPost::new("alpha", "Alpha", "a", date(2023, 1, 1)),
            BlogPost::new("mid", "Mid", "m", date(2023, 2, 1)),
        ];
        let items = feed_items(&posts);
        assert_eq!(items.len(), posts.len());
        let links: Vec<_> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, ["/blog/zeta/", "/blog/alpha/", "/blog/mid/"]);
    }

    #[test]
    fn fields_are_copied_verbatim() {
        let post = BlogPost::new(
            "post",
            "  Spaces & <angle> brackets  ",
            "A long description that is not truncated in any way at all.",
            date(2021, 12, 31),
        )
        .with_custom_data("<category>rust</category>");

        let item = FeedItem::from(&post);
        assert_eq!(item.title, post.title);
        assert_eq!(item.pub_date, post.pub_date);
        assert_eq!(item.description, post.description);
        assert_eq!(item.custom_data, post.custom_data);
    }

    #[test]
    fn empty_feed_keeps_channel_fields() {
        let xml = render_rss(&options(), &[]).unwrap();
        let channel = Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(channel.title(), "My Blog");
        assert_eq!(channel.description(), "desc");
        assert_eq!(channel.link(), "https://chrlschn.dev");
        assert!(channel.items().is_empty());
    }

    #[test]
    fn single_post_end_to_end() {
        let post = BlogPost::new("hi", "Hi", "d", date(2023, 1, 1));
        let items = feed_items(&[post]);
        assert_eq!(items[0].link, "/blog/hi/");

        let xml = render_rss(&options(), &items).unwrap();
        let channel = Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(channel.title(), "My Blog");
        assert_eq!(channel.items().len(), 1);

        let item = &channel.items()[0];
        assert_eq!(item.title(), Some("Hi"));
        assert_eq!(item.description(), Some("d"));
        assert_eq!(item.link(), Some("https://chrlschn.dev/blog/hi/"));
        assert_eq!(
            item.guid().map(|g| g.value()),
            Some("https://chrlschn.dev/blog/hi/")
        );
        let pub_date = DateTime::parse_from_rfc2822(item.pub_date().unwrap()).unwrap();
        assert_eq!(pub_date, date(2023, 1, 1));
    }

    #[test]
    fn rendered_items_keep_input_order() {
        let posts: Vec<_> = ["c", "a", "b"]
            .iter()
            .map(|s| BlogPost::new(*s, s.to_uppercase(), "d", date(2023, 1, 1)))
            .collect();
        let xml = render_rss(&options(), &feed_items(&posts)).unwrap();
        let channel = Channel::read_from(xml.as_bytes()).unwrap();
        let titles: Vec<_> = channel.items().iter().filter_map(|i| i.title()).collect();
        assert_eq!(titles, ["C", "A", "B"]);
    }

    #[test]
    fn custom_data_is_emitted_inside_the_item() {
        let post = BlogPost::new("hi", "Hi", "d", date(2023, 1, 1)).with_custom_data(
            r#"<media:content url="https://chrlschn.dev/hero.jpg" medium="image"/><media:credit>me &amp; you</media:credit>"#,
        );
        let mut opts = options();
        opts.xmlns
            .insert("media".into(), "http://search.yahoo.com/mrss/".into());

        let xml = render_rss(&opts, &feed_items(&[post])).unwrap();
        assert!(xml.contains(r#"xmlns:media="http://search.yahoo.com/mrss/""#));
        let item_xml = &xml[xml.find("<item>").unwrap()..xml.find("</item>").unwrap()];
        assert!(item_xml.contains(r#"url="https://chrlschn.dev/hero.jpg""#));
        assert!(item_xml.contains("<media:credit>me &amp; you</media:credit>"));
        assert!(
            item_xml.find("<media:content").unwrap() < item_xml.find("<media:credit").unwrap()
        );
    }

    #[test]
    fn nested_custom_data_is_kept() {
        let ext = parse_fragment("<a><b>1</b><c x=\"y\">2</c></a>").unwrap();
        assert_eq!(ext.len(), 1);
        assert_eq!(ext[0].name, "a");
        let children: Vec<_> = ext[0].children.values().flatten().collect();
        assert_eq!(children[0].name, "b");
        assert_eq!(children[0].value.as_deref(), Some("1"));
        assert_eq!(children[1].attrs.get("x").map(String::as_str), Some("y"));
    }

    #[test]
    fn malformed_custom_data_is_rejected() {
        let post =
            BlogPost::new("hi", "Hi", "d", date(2023, 1, 1)).with_custom_data("<open>never closed");
        let err = render_rss(&options(), &feed_items(&[post])).unwrap_err();
        assert!(format!("{err:#}").contains("invalid customData"));
    }

    #[test]
    fn custom_data_text_is_kept_verbatim() {
        let post = BlogPost::new("hi", "Hi", "d", date(2023, 1, 1))
            .with_custom_data("<x>  spaced  </x>\n<y>\n  two\n  lines\n</y>");
        let xml = render_rss(&options(), &feed_items(&[post])).unwrap();
        assert!(xml.contains("<x>  spaced  </x>"));
        assert!(xml.contains("<y>\n  two\n  lines\n</y>"));
    }

    #[test]
    fn indentation_between_child_elements_is_dropped() {
        let ext = parse_fragment("<a>\n  <b>1</b>\n  <c>2</c>\n</a>").unwrap();
        assert_eq!(ext[0].value, None);
        assert_eq!(ext[0].children.len(), 2);
    }

    #[test]
    fn mixed_content_is_rejected() {
        let err = parse_fragment("<p>a<b>x</b>c</p>").unwrap_err();
        assert!(err.to_string().contains("<p> mixes text and child elements"));
    }

    #[test]
    fn comments_are_not_emitted() {
        let ext = parse_fragment("<!-- c --><y>1</y>").unwrap();
        assert_eq!(ext.len(), 1);
        assert_eq!(ext[0].name, "y");
        assert_eq!(ext[0].value.as_deref(), Some("1"));
    }

    #[test]
    fn bare_text_custom_data_is_rejected() {
        assert!(parse_fragment("just text").is_err());
    }

    #[test]
    fn invalid_site_url_is_an_error() {
        let opts = FeedOptions::new("t", "d", "not a url");
        assert!(render_rss(&opts, &[]).is_err());
    }

    #[test]
    fn build_feed_reads_the_blog_collection() {
        let mut config = SiteConfig::default();
        config.site_title = "My Blog".into();
        config.site_description = "desc".into();
        let source = StaticCollection(vec![
            BlogPost::new("one", "One", "first", date(2023, 1, 1)),
            BlogPost::new("two", "Two", "second", date(2023, 1, 2)),
        ]);

        let xml = build_feed(&config, &source).unwrap();
        let channel = Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(channel.title(), "My Blog");
        let links: Vec<_> = channel.items().iter().filter_map(|i| i.link()).collect();
        assert_eq!(
            links,
            [
                "https://chrlschn.dev/blog/one/",
                "https://chrlschn.dev/blog/two/"
            ]
        );
    }

    #[test]
    fn build_feed_propagates_collection_errors() {
        struct Failing;
        impl CollectionSource for Failing {
            fn get_collection(&self, _name: &str) -> Result<Vec<BlogPost>> {
                bail!("content source unavailable")
            }
        }

        let err = build_feed(&SiteConfig::default(), &Failing).unwrap_err();
        assert!(format!("{err:#}").contains("content source unavailable"));
    }
}
