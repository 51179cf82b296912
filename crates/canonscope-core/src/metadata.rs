//! Metadata table of the collection: one row per work with id, basename,
//! title and author. Built from TEI source documents, stored as TSV.

use std::io::{Read, Write};
use std::path::Path;

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CanonError, Result};
use crate::models::WorkMetadata;

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));

// ─── TSV table ─────────────────────────────────────────────

/// Read the metadata table from any reader.
pub fn read_table<R: Read>(reader: R) -> Result<Vec<WorkMetadata>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .from_reader(reader);
    let mut works = Vec::new();
    for row in rdr.deserialize() {
        works.push(row?);
    }
    Ok(works)
}

/// Read the metadata table from disk.
pub fn load_table(path: &Path) -> Result<Vec<WorkMetadata>> {
    let file = std::fs::File::open(path)?;
    let works = read_table(file).map_err(|e| CanonError::MalformedTable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!("loaded {} works from {}", works.len(), path.display());
    Ok(works)
}

/// Write the metadata table with the `xmlid basename title au-name` header.
pub fn write_table<W: Write>(writer: W, works: &[WorkMetadata]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);
    for work in works {
        wtr.serialize(work)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_table(path: &Path, works: &[WorkMetadata]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_table(file, works)
}

// ─── TEI extraction ────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Title,
    Author,
}

/// Extract id, title and author from a TEI document.
///
/// The id is the first `xml:id` attribute, the title and author are the
/// text of the first `<title>` and `<author>` elements. Parenthesized parts
/// of the author (life dates, pseudonyms) are removed.
pub fn extract_tei(xml: &str, basename: &str) -> Result<WorkMetadata> {
    let mut reader = Reader::from_str(xml);

    let mut id: Option<String> = None;
    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut capture: Option<(Capture, usize, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if id.is_none() {
                    id = xml_id(&e)?;
                }
                if let Some((_, depth, _)) = capture.as_mut() {
                    *depth += 1;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"title" if title.is_none() => {
                        capture = Some((Capture::Title, 0, String::new()));
                    }
                    b"author" if author.is_none() => {
                        capture = Some((Capture::Author, 0, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if id.is_none() {
                    id = xml_id(&e)?;
                }
            }
            Event::Text(t) => {
                if let Some((_, _, buf)) = capture.as_mut() {
                    buf.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some((_, _, buf)) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => match capture.take() {
                Some((kind, 0, buf)) => {
                    let text = normalize_whitespace(&buf);
                    match kind {
                        Capture::Title => title = Some(text),
                        Capture::Author => {
                            author = Some(normalize_whitespace(&PARENTHESIZED.replace_all(&text, "")))
                        }
                    }
                }
                Some((kind, depth, buf)) => capture = Some((kind, depth - 1, buf)),
                None => {}
            },
            Event::Eof => break,
            _ => {}
        }
        if id.is_some() && title.is_some() && author.is_some() {
            break;
        }
    }

    let missing = |field| CanonError::MissingTeiField {
        path: basename.to_string(),
        field,
    };
    Ok(WorkMetadata {
        id: id.ok_or_else(|| missing("xml:id"))?,
        basename: basename.to_string(),
        title: title.ok_or_else(|| missing("<title>"))?,
        author: author.ok_or_else(|| missing("<author>"))?,
    })
}

fn xml_id(e: &quick_xml::events::BytesStart<'_>) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == b"xml:id" {
            return Ok(Some(attr.unescape_value()?.trim().to_string()));
        }
    }
    Ok(None)
}

fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract metadata from every `*.xml` file in `dir`, sorted by file name.
///
/// Documents that cannot be read or lack a field are logged and skipped.
pub fn collect_tei(dir: &Path) -> Result<Vec<WorkMetadata>> {
    let mut paths = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml")))
        .collect::<Vec<_>>();
    paths.sort();

    let mut works = Vec::with_capacity(paths.len());
    for path in paths {
        let basename = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extracted = std::fs::read_to_string(&path)
            .map_err(CanonError::from)
            .and_then(|xml| extract_tei(&xml, &basename));
        match extracted {
            Ok(work) => {
                debug!("{}: {} / {}", work.id, work.author, work.title);
                works.push(work);
            }
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    Ok(works)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0" xml:id="FRA00101" xml:lang="fr">
  <teiHeader>
    <fileDesc>
      <titleStmt>
        <title>Belle-Rivière : ELTeC edition</title>
        <author>Aimard, Gustave (1818-1883)</author>
      </titleStmt>
    </fileDesc>
  </teiHeader>
  <text><body><p>...</p></body></text>
</TEI>"#;

    #[test]
    fn extracts_header_fields() {
        let work = extract_tei(TEI, "FRA00101_Aimard").unwrap();
        assert_eq!(work.id, "FRA00101");
        assert_eq!(work.basename, "FRA00101_Aimard");
        assert_eq!(work.title, "Belle-Rivière : ELTeC edition");
        assert_eq!(work.author, "Aimard, Gustave");
    }

    #[test]
    fn nested_markup_inside_title_is_flattened() {
        let xml = r#"<TEI xml:id="X1"><title>La <hi>Curée</hi></title><author>Zola</author></TEI>"#;
        let work = extract_tei(xml, "X1").unwrap();
        assert_eq!(work.title, "La Curée");
    }

    #[test]
    fn missing_author_is_reported() {
        let xml = r#"<TEI xml:id="X2"><title>Nana</title></TEI>"#;
        let err = extract_tei(xml, "X2").unwrap_err();
        assert!(matches!(err, CanonError::MissingTeiField { field: "<author>", .. }));
    }

    #[test]
    fn table_roundtrip_keeps_header_names() {
        let works = vec![
            WorkMetadata::new("FRA00101", "FRA00101_Aimard", "Belle-Rivière", "Aimard, Gustave"),
            WorkMetadata::new("FRA00102", "FRA00102_Zola", "Nana", "Zola, Émile"),
        ];
        let mut buf = Vec::new();
        write_table(&mut buf, &works).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("xmlid\tbasename\ttitle\tau-name\n"));

        let back = read_table(buf.as_slice()).unwrap();
        assert_eq!(back, works);
    }

    #[test]
    fn collects_directory_and_skips_broken_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("FRA00101_Aimard.xml"), TEI).unwrap();
        std::fs::write(dir.path().join("broken.xml"), "<TEI><title>x</title></TEI>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let works = collect_tei(dir.path()).unwrap();
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].id, "FRA00101");
    }
}
