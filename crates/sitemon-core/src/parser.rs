//! Sitemap XML parsing
//!
//! Turns raw sitemap text into a [`SitemapDocument`]: either the child
//! sitemap locations of a `<sitemapindex>` or the URL records of a
//! `<urlset>`. The root element decides the variant; namespace prefixes are
//! ignored.
//!
//! ```
//! use sitemon_core::parser::{parse, SitemapDocument};
//!
//! let xml = r#"<urlset><url><loc>https://example.com/</loc></url></urlset>"#;
//! match parse(xml).unwrap() {
//!     SitemapDocument::Urlset(urls) => assert_eq!(urls.len(), 1),
//!     SitemapDocument::Index(_) => unreachable!(),
//! }
//! ```

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::model::UrlRecord;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: locations of child sitemaps, in document order
    Index(Vec<String>),
    /// `<urlset>`: URL records, in document order
    Urlset(Vec<UrlRecord>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Index,
    Urlset,
    Unknown,
}

impl Root {
    fn from_name(name: &str) -> Self {
        match name {
            "sitemapindex" => Root::Index,
            "urlset" => Root::Urlset,
            _ => Root::Unknown,
        }
    }

    /// Element name of one entry under this root
    fn item_name(self) -> Option<&'static str> {
        match self {
            Root::Index => Some("sitemap"),
            Root::Urlset => Some("url"),
            Root::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "loc" => Some(Field::Loc),
            "lastmod" => Some(Field::LastMod),
            "changefreq" => Some(Field::ChangeFreq),
            "priority" => Some(Field::Priority),
            _ => None,
        }
    }
}

/// Raw text collected for one `<url>` or `<sitemap>` element
#[derive(Debug, Default)]
struct Entry {
    loc: String,
    lastmod: String,
    changefreq: String,
    priority: String,
}

impl Entry {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Loc => &mut self.loc,
            Field::LastMod => &mut self.lastmod,
            Field::ChangeFreq => &mut self.changefreq,
            Field::Priority => &mut self.priority,
        }
    }

    fn into_record(self) -> Option<UrlRecord> {
        let location = non_blank(self.loc)?;
        Some(UrlRecord {
            location,
            last_modified: non_blank(self.lastmod),
            change_frequency: non_blank(self.changefreq),
            priority: non_blank(self.priority),
        })
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Parse sitemap text into its typed shape
///
/// A single `<url>`/`<sitemap>` child yields a one-element sequence. Entries
/// whose `<loc>` is missing or blank are dropped.
///
/// # Errors
///
/// `Error::Parse` when:
/// - the text is not well-formed XML
/// - the root element is neither `<urlset>` nor `<sitemapindex>`
/// - no entry with a non-blank location remains
pub fn parse(xml: &str) -> Result<SitemapDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<Root> = None;
    let mut depth = 0usize;
    let mut entries: Vec<Entry> = Vec::new();
    let mut current: Option<Entry> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::parse(format!(
                "Invalid XML format in sitemap (at byte {}): {}",
                reader.error_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                enter(&name, depth, &mut root, &mut current, &mut field);
                depth += 1;
            }
            Event::Empty(e) => {
                let name = local_name(e.local_name().as_ref());
                enter(&name, depth, &mut root, &mut current, &mut field);
                leave(depth, &mut current, &mut field, &mut entries);
            }
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::parse("Invalid XML format in sitemap: unexpected closing tag")
                })?;
                leave(depth, &mut current, &mut field, &mut entries);
            }
            Event::Text(e) => {
                if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    let text = e.unescape().map_err(|e| {
                        Error::parse(format!("Invalid XML format in sitemap: {}", e))
                    })?;
                    entry.slot(f).push_str(&text);
                }
            }
            Event::CData(e) => {
                if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    entry.slot(f).push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => {
                if depth != 0 {
                    return Err(Error::parse(
                        "Invalid XML format in sitemap: unexpected end of document",
                    ));
                }
                break;
            }
            _ => {}
        }
    }

    match root {
        Some(Root::Index) => {
            let locations: Vec<String> = entries
                .into_iter()
                .filter_map(|entry| non_blank(entry.loc))
                .collect();
            if locations.is_empty() {
                return Err(Error::parse("No valid sitemaps found in sitemap index"));
            }
            Ok(SitemapDocument::Index(locations))
        }
        Some(Root::Urlset) => {
            let records: Vec<UrlRecord> =
                entries.into_iter().filter_map(Entry::into_record).collect();
            if records.is_empty() {
                return Err(Error::parse("No valid URLs found in sitemap"));
            }
            Ok(SitemapDocument::Urlset(records))
        }
        Some(Root::Unknown) | None => Err(Error::parse("Unrecognized sitemap format")),
    }
}

/// Track an opening tag at `depth` (0 = root)
fn enter(
    name: &str,
    depth: usize,
    root: &mut Option<Root>,
    current: &mut Option<Entry>,
    field: &mut Option<Field>,
) {
    match depth {
        0 => {
            root.get_or_insert(Root::from_name(name));
        }
        1 => {
            if root.and_then(Root::item_name) == Some(name) {
                *current = Some(Entry::default());
            }
        }
        2 if current.is_some() => *field = Field::from_name(name),
        _ => {}
    }
}

/// Track the closing tag of the element opened at `depth`
fn leave(
    depth: usize,
    current: &mut Option<Entry>,
    field: &mut Option<Field>,
    entries: &mut Vec<Entry>,
) {
    match depth {
        1 => {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
        }
        2 => *field = None,
        _ => {}
    }
}
