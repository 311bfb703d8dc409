//! RSS 2.0 / RSS 1.0 / Atom parsing

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{NewsError, Result};

/// One item or entry from a feed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// `description` / Atom `summary`
    pub summary: Option<String>,
    /// `content:encoded` / Atom `content`
    pub content: Option<String>,
}

impl FeedEntry {
    /// Text to build a snippet from
    pub fn body(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.content.as_deref())
    }
}

/// Parse a feed document into its entries, in document order
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    let mut is_feed = false;
    let mut current: Option<FeedEntry> = None;
    let mut current_element = String::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e);
                match name.as_str() {
                    "rss" | "feed" | "rdf:RDF" => is_feed = true,
                    "item" | "entry" => current = Some(FeedEntry::default()),
                    "link" => {
                        if let Some(entry) = current.as_mut() {
                            atom_link(entry, e);
                        }
                    }
                    _ => {}
                }
                current_element = name;
                text.clear();
            }
            Ok(Event::Empty(ref e)) => {
                if element_name(e) == "link" {
                    if let Some(entry) = current.as_mut() {
                        atom_link(entry, e);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if current.is_some() {
                    let chunk = e
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(e)) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" || name == "entry" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                } else if let Some(entry) = current.as_mut() {
                    if name == current_element {
                        apply_field(entry, &name, text.trim());
                    }
                }
                current_element.clear();
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(NewsError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !is_feed {
        return Err(NewsError::NotAFeed);
    }

    Ok(entries)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Atom links carry the URL in `href`; the first alternate link wins
fn atom_link(entry: &mut FeedEntry, e: &BytesStart<'_>) {
    let attr = |key: &str| -> Option<String> {
        e.try_get_attribute(key)
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    };

    let Some(href) = attr("href") else {
        return;
    };
    let rel = attr("rel");
    if entry.link.is_none() && matches!(rel.as_deref(), None | Some("alternate")) {
        entry.link = Some(href);
    }
}

fn apply_field(entry: &mut FeedEntry, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let value = value.to_string();

    match name {
        "title" => entry.title = Some(value),
        "link" if entry.link.is_none() => entry.link = Some(value),
        "guid" | "id" if entry.link.is_none() && value.starts_with("http") => {
            entry.link = Some(value)
        }
        "pubDate" | "published" | "dc:date" => {
            if let Some(date) = parse_date(&value) {
                entry.published = Some(date);
            }
        }
        "updated" if entry.published.is_none() => entry.published = parse_date(&value),
        "description" | "summary" => entry.summary = Some(value),
        "content:encoded" | "content" => entry.content = Some(value),
        _ => {}
    }
}

/// RFC 2822 (RSS) or RFC 3339 (Atom, Dublin Core)
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
