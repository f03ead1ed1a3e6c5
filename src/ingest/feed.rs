// src/ingest/feed.rs
//! Pull-parser for RSS 2.0, RSS 1.0 (RDF) and Atom documents.
//!
//! Parsing never fails outright: a broken document yields whatever entries were
//! read before the error, with `well_formed = false`. Liveness checks and the
//! fetcher both decide from that.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Rdf,
    Atom,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    /// `None` when the root element is not a feed (HTML error page, JSON, …).
    pub kind: Option<FeedKind>,
    pub entries: Vec<FeedEntry>,
    pub well_formed: bool,
}

impl ParsedFeed {
    /// A recognised feed that is either well-formed or yielded at least one entry.
    pub fn is_valid_feed(&self) -> bool {
        self.kind.is_some() && (self.well_formed || !self.entries.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    Summary,
    Content,
    Published,
    Updated,
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    link: Option<String>,
    guid: Option<String>,
    summary: String,
    content: String,
    published: Option<String>,
    updated: Option<String>,
}

impl EntryBuilder {
    fn finish(self) -> FeedEntry {
        let link = self
            .link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .or_else(|| {
                self.guid
                    .map(|g| g.trim().to_string())
                    .filter(|g| g.starts_with("http://") || g.starts_with("https://"))
            });
        let summary = if self.summary.trim().is_empty() {
            self.content
        } else {
            self.summary
        };
        let published = self
            .published
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.updated.as_deref().and_then(parse_timestamp));
        FeedEntry {
            title: self.title,
            link,
            summary,
            published,
        }
    }

    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Link => self.link.get_or_insert_with(String::new),
            Field::Guid => self.guid.get_or_insert_with(String::new),
            Field::Published => self.published.get_or_insert_with(String::new),
            Field::Updated => self.updated.get_or_insert_with(String::new),
        };
        // text split by inline markup: keep the words apart
        if !slot.is_empty() && !text.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }
}

fn field_for(local: &[u8]) -> Option<Field> {
    match local {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"guid" | b"id" => Some(Field::Guid),
        b"description" | b"summary" => Some(Field::Summary),
        b"content" | b"encoded" => Some(Field::Content),
        b"pubDate" | b"published" | b"date" | b"issued" => Some(Field::Published),
        b"updated" | b"modified" => Some(Field::Updated),
        _ => None,
    }
}

/// Atom `<link href=… rel=…/>`; only alternate (or unqualified) links count.
fn atom_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().ok()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel_ok = value == "alternate",
            _ => {}
        }
    }
    href.filter(|_| rel_ok)
}

/// Entities that HTML-ish feeds use but XML does not define.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

pub fn parse_feed(xml: &str) -> ParsedFeed {
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let mut out = ParsedFeed::default();
    let mut seen_root = false;
    let mut depth: usize = 0;
    let mut current: Option<EntryBuilder> = None;
    // (field, local name that closes it)
    let mut field: Option<(Field, Vec<u8>)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let local = e.local_name().as_ref().to_vec();
                if !seen_root {
                    seen_root = true;
                    out.kind = match local.as_slice() {
                        b"rss" => Some(FeedKind::Rss),
                        b"RDF" => Some(FeedKind::Rdf),
                        b"feed" => Some(FeedKind::Atom),
                        _ => None,
                    };
                    if out.kind.is_none() {
                        return out;
                    }
                    continue;
                }
                if field.is_some() {
                    continue;
                }
                if local == b"item" || local == b"entry" {
                    current = Some(EntryBuilder::default());
                    continue;
                }
                if let Some(entry) = current.as_mut() {
                    // atom:link and friends inside RSS items
                    if local == b"link" && out.kind != Some(FeedKind::Atom) && e.name().prefix().is_some() {
                        continue;
                    }
                    if local == b"link" && out.kind == Some(FeedKind::Atom) {
                        if let Some(href) = atom_href(&e) {
                            entry.link.get_or_insert(href);
                        }
                        continue;
                    }
                    if let Some(f) = field_for(&local) {
                        // first occurrence wins (media:title and friends come later)
                        let taken = match f {
                            Field::Title => !entry.title.is_empty(),
                            Field::Summary => !entry.summary.is_empty(),
                            Field::Content => !entry.content.is_empty(),
                            Field::Link => entry.link.is_some(),
                            Field::Guid => entry.guid.is_some(),
                            Field::Published => entry.published.is_some(),
                            Field::Updated => entry.updated.is_some(),
                        };
                        if !taken {
                            field = Some((f, local));
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if !seen_root {
                    return out;
                }
                if field.is_none()
                    && out.kind == Some(FeedKind::Atom)
                    && e.local_name().as_ref() == b"link"
                {
                    if let Some(entry) = current.as_mut() {
                        if let Some(href) = atom_href(&e) {
                            entry.link.get_or_insert(href);
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(entry), Some((f, _))) = (current.as_mut(), field.as_ref()) {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    entry.push(*f, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(entry), Some((f, _))) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    entry.push(*f, &text);
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                let local = e.local_name();
                let local = local.as_ref();
                if let Some((_, name)) = field.as_ref() {
                    if name.as_slice() == local {
                        field = None;
                    }
                    continue;
                }
                if local == b"item" || local == b"entry" {
                    if let Some(entry) = current.take() {
                        out.entries.push(entry.finish());
                    }
                }
            }
            Ok(Event::Eof) => {
                out.well_formed = seen_root && depth == 0;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(target: "feed", error = %e, pos = reader.buffer_position(), "xml error");
                out.well_formed = false;
                break;
            }
        }
    }

    out
}

/// RFC 2822 (RSS), RFC 3339 (Atom, `dc:date`), with chrono as a lenient
/// fallback for named zones like `EST`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let odt = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok();
    if let Some(odt) = odt {
        return DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond());
    }
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
<item><title>First &amp; best</title><link>https://x.test/1</link>
<description><![CDATA[<p>Hello</p>]]></description>
<pubDate>Tue, 04 Mar 2025 10:00:00 +0000</pubDate></item>
<item><title>No date</title><link>https://x.test/2</link></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>A</title>
<entry><title>Atom one</title>
<link rel="self" href="https://a.test/self"/>
<link rel="alternate" href="https://a.test/post"/>
<summary>Sum</summary><updated>2025-03-04T09:30:00Z</updated></entry>
</feed>"#;

    const RDF: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
 xmlns="http://purl.org/rss/1.0/" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel><title>R</title></channel>
<item><title>Rdf item</title><link>https://r.test/1</link>
<dc:date>2025-03-04T08:00:00+09:00</dc:date></item>
</rdf:RDF>"#;

    #[test]
    fn rss_items_parse() {
        let f = parse_feed(RSS);
        assert_eq!(f.kind, Some(FeedKind::Rss));
        assert!(f.well_formed);
        assert_eq!(f.entries.len(), 2);
        assert_eq!(f.entries[0].title, "First & best");
        assert_eq!(f.entries[0].summary, "<p>Hello</p>");
        assert_eq!(
            f.entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap())
        );
        assert_eq!(f.entries[1].published, None);
    }

    #[test]
    fn atom_prefers_alternate_link_and_falls_back_to_updated() {
        let f = parse_feed(ATOM);
        assert_eq!(f.kind, Some(FeedKind::Atom));
        let e = &f.entries[0];
        assert_eq!(e.link.as_deref(), Some("https://a.test/post"));
        assert_eq!(
            e.published,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn rdf_items_live_outside_channel() {
        let f = parse_feed(RDF);
        assert_eq!(f.kind, Some(FeedKind::Rdf));
        assert_eq!(f.entries.len(), 1);
        assert_eq!(
            f.entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 3, 23, 0, 0).unwrap())
        );
    }

    #[test]
    fn html_page_is_not_a_feed() {
        let f = parse_feed("<html><body>gone</body></html>");
        assert_eq!(f.kind, None);
        assert!(!f.is_valid_feed());
    }

    #[test]
    fn truncated_feed_keeps_entries_read_so_far() {
        let cut = &RSS[..RSS.find("<item><title>No date").unwrap()];
        let broken = format!("{cut}<item><title>oops</channel>");
        let f = parse_feed(&broken);
        assert!(!f.well_formed);
        assert_eq!(f.entries.len(), 1);
        assert!(f.is_valid_feed());
    }

    #[test]
    fn empty_but_well_formed_feed_is_valid() {
        let f = parse_feed("<rss version=\"2.0\"><channel><title>x</title></channel></rss>");
        assert!(f.entries.is_empty());
        assert!(f.is_valid_feed());
    }

    #[test]
    fn html_entities_do_not_break_parsing() {
        let xml = "<rss><channel><item><title>A&nbsp;B &mdash; C</title></item></channel></rss>";
        let f = parse_feed(xml);
        assert!(f.well_formed);
        assert_eq!(f.entries[0].title, "A B - C");
    }

    #[test]
    fn inline_markup_keeps_words_apart() {
        let xml = "<rss><channel><item><title>Hello <b>world</b> again</title>\
<link>https://x.test/m</link></item></channel></rss>";
        let f = parse_feed(xml);
        assert_eq!(f.entries[0].title, "Hello world again");
    }

    #[test]
    fn namespaced_link_in_rss_item_is_ignored() {
        let xml = r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel><item>
<title>t</title>
<atom:link href="https://x.test/self" rel="self">https://x.test/self</atom:link>
<link>https://x.test/real</link>
</item></channel></rss>"#;
        let f = parse_feed(xml);
        assert_eq!(f.entries[0].link.as_deref(), Some("https://x.test/real"));
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("Tue, 04 Mar 2025 10:00:00 GMT").is_some());
        assert!(parse_timestamp("2025-03-04T10:00:00.5+01:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("  ").is_none());
    }
}
