use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, de};

/// Frontmatter schema of the `blog` collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogFrontmatter {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub pub_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hero_image: Option<String>,
    #[serde(default)]
    pub custom_data: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Split a markdown document into its YAML frontmatter and body.
///
/// Returns `None` for the frontmatter when the document does not open with `---`.
pub fn split_frontmatter(content: &str) -> (Option<String>, String) {
    let mut lines = content.lines();

    if lines.next().map(str::trim_end) != Some("---") {
        return (None, content.to_string());
    }

    let mut fm_lines = vec![];
    for line in lines.by_ref() {
        if line.trim() == "---" {
            break;
        }
        fm_lines.push(line);
    }

    let remainder = lines.collect::<Vec<&str>>().join("\n");
    (Some(fm_lines.join("\n")), remainder)
}

pub fn parse_blog_frontmatter(content: &str) -> Result<BlogFrontmatter> {
    let (yaml, _body) = split_frontmatter(content);
    let yaml = yaml.context("missing frontmatter block")?;
    serde_yaml::from_str(&yaml).context("parsing frontmatter")
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DD` and `Mon DD YYYY`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d", "%b %d %Y", "%B %d %Y", "%b %d, %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date `{raw}`")))
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid date `{raw}`"))),
        None => Ok(None),
    }
}
