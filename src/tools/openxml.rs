//! Office Open XML (`.docx`) text and metadata extraction.
//!
//! A `.docx` is a zip archive of XML parts. Body text lives in
//! `word/document.xml` as `<w:t>` runs grouped into `<w:p>` paragraphs;
//! metadata lives in `docProps/core.xml` (Dublin Core) and
//! `docProps/app.xml` (application statistics).

use super::{AlternateExtractor, Properties, ReadSeek, ToolOutput};
use crate::error::ToolError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;

const DOCUMENT_PART: &str = "word/document.xml";
const CORE_PART: &str = "docProps/core.xml";
const APP_PART: &str = "docProps/app.xml";

/// Element local name → property name, for `docProps/core.xml`.
const CORE_FIELDS: &[(&str, &str)] = &[
    ("title", "Title"),
    ("subject", "Subject"),
    ("creator", "Creator"),
    ("keywords", "Keywords"),
    ("description", "Description"),
    ("lastModifiedBy", "LastModifiedBy"),
    ("revision", "Revision"),
    ("category", "Category"),
    ("lastPrinted", "LastPrinted"),
    ("created", "Created"),
    ("modified", "Modified"),
];

/// Element local name → property name, for `docProps/app.xml`.
const APP_FIELDS: &[(&str, &str)] = &[
    ("Application", "AppName"),
    ("Company", "Company"),
    ("Pages", "PageCount"),
    ("Words", "WordCount"),
    ("Characters", "CharCount"),
];

/// Extractor for the zip-based Word format.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenXmlExtractor;

impl AlternateExtractor for OpenXmlExtractor {
    fn convert(&self, input: &mut dyn ReadSeek) -> Result<ToolOutput, ToolError> {
        let mut archive = zip::ZipArchive::new(input)
            .map_err(|e| ToolError::Malformed(format!("not a zip archive: {e}")))?;

        let document = read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| ToolError::Malformed(format!("missing {DOCUMENT_PART}")))?;
        let text = document_text(&document)?;

        let mut properties = Properties::new();
        if let Some(core) = read_part(&mut archive, CORE_PART)? {
            properties.extend(simple_fields(&core, CORE_FIELDS)?);
        }
        if let Some(app) = read_part(&mut archive, APP_PART)? {
            properties.extend(simple_fields(&app, APP_FIELDS)?);
        }

        Ok(ToolOutput { text, properties })
    }
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ToolError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ToolError::Malformed(format!("{name}: {e}"))),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Plain text of a WordprocessingML body: one line per paragraph.
pub fn document_text(xml: &str) -> Result<String, ToolError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == b"w:t" {
                    in_run_text = true;
                }
            }
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_run_text => {
                let chunk = e
                    .unescape()
                    .map_err(|err| ToolError::Malformed(format!("{DOCUMENT_PART}: {err}")))?;
                text.push_str(&chunk);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ToolError::Malformed(format!(
                    "{DOCUMENT_PART} at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(text.trim_end().to_string())
}

/// Collect the text of flat `<prefix:name>value</prefix:name>` elements.
fn simple_fields(xml: &str, fields: &[(&str, &'static str)]) -> Result<Properties, ToolError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut current: Option<&'static str> = None;
    let mut props = Properties::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                current = fields
                    .iter()
                    .find(|(name, _)| name.as_bytes() == local.as_ref())
                    .map(|&(_, prop)| prop);
            }
            Ok(Event::Text(e)) => {
                if let Some(prop) = current {
                    let value = e
                        .unescape()
                        .map_err(|err| ToolError::Malformed(err.to_string()))?;
                    if !value.is_empty() {
                        props.push((prop.to_string(), value.into_owned()));
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ToolError::Malformed(e.to_string())),
        }
    }
    Ok(props)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world &amp; co</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second</w:t><w:tab/><w:t>line</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    const CORE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>Minutes</dc:title>
  <dc:creator>Jane Roe</dc:creator>
  <cp:lastModifiedBy>John Doe</cp:lastModifiedBy>
  <dcterms:created xsi:type="dcterms:W3CDTF">2020-01-02T03:04:05Z</dcterms:created>
  <dcterms:modified xsi:type="dcterms:W3CDTF">2020-01-02T03:04:06Z</dcterms:modified>
</cp:coreProperties>"#;

    /// A minimal `.docx` archive in memory.
    pub(crate) fn docx_bytes(with_core: bool) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(DOCUMENT_PART, options).unwrap();
            zip.write_all(DOCUMENT.as_bytes()).unwrap();
            if with_core {
                zip.start_file(CORE_PART, options).unwrap();
                zip.write_all(CORE.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn paragraphs_become_lines() {
        let text = document_text(DOCUMENT).unwrap();
        assert_eq!(text, "Hello world & co\nSecond\tline");
    }

    #[test]
    fn core_properties_are_named() {
        let props = simple_fields(CORE, CORE_FIELDS).unwrap();
        assert!(props.contains(&("Title".into(), "Minutes".into())));
        assert!(props.contains(&("Creator".into(), "Jane Roe".into())));
        assert!(props.contains(&("LastModifiedBy".into(), "John Doe".into())));
        assert!(props.contains(&("Modified".into(), "2020-01-02T03:04:06Z".into())));
    }

    #[test]
    fn converts_archive() {
        let mut input = Cursor::new(docx_bytes(true));
        let out = OpenXmlExtractor.convert(&mut input).unwrap();
        assert!(out.text.starts_with("Hello world"));
        assert!(out.properties.iter().any(|(k, _)| k == "Created"));
    }

    #[test]
    fn metadata_parts_are_optional() {
        let mut input = Cursor::new(docx_bytes(false));
        let out = OpenXmlExtractor.convert(&mut input).unwrap();
        assert!(out.properties.is_empty());
        assert!(!out.text.is_empty());
    }

    #[test]
    fn non_zip_input_is_malformed() {
        let mut input = Cursor::new(b"\xD0\xCF\x11\xE0 not a zip".to_vec());
        let err = OpenXmlExtractor.convert(&mut input).unwrap_err();
        assert!(err.to_string().contains("not a zip archive"), "got: {err}");
    }
}
