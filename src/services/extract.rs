//! Plain-text extraction for uploaded documents.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::IngestError;
use crate::models::DocumentFormat;

static RE_DOCX_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>|<w:tab\s*/>|<w:(?:br|cr)\s*/>").unwrap()
});
static RE_XML_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// Extract text on the blocking pool; PDF and DOCX parsing is CPU bound.
pub async fn extract_text(format: DocumentFormat, bytes: Vec<u8>) -> Result<String, IngestError> {
    tokio::task::spawn_blocking(move || extract_text_blocking(format, &bytes))
        .await
        .map_err(|e| IngestError::ExtractionFailed(e.to_string()))?
}

pub fn extract_text_blocking(format: DocumentFormat, bytes: &[u8]) -> Result<String, IngestError> {
    match format {
        DocumentFormat::Txt => String::from_utf8(bytes.to_vec())
            .map_err(|e| IngestError::ExtractionFailed(format!("invalid UTF-8: {}", e))),
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IngestError> {
    // The PDF parser panics on some malformed inputs.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(IngestError::ExtractionFailed(format!("pdf: {}", e))),
        Err(_) => Err(IngestError::ExtractionFailed(
            "pdf: parser panicked on malformed input".to_string(),
        )),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::ExtractionFailed(format!("docx: {}", e)))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| IngestError::ExtractionFailed(format!("docx: {}", e)))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::ExtractionFailed(format!("docx: {}", e)))?;

    Ok(docx_xml_to_text(&xml))
}

/// Text runs joined, one line per paragraph.
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    for caps in RE_DOCX_TOKEN.captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            out.push_str(&decode_entities(run.as_str()));
            continue;
        }
        match &caps[0] {
            "</w:p>" => out.push('\n'),
            token if token.starts_with("<w:tab") => out.push('\t'),
            _ => out.push('\n'),
        }
    }
    out.trim_end().to_string()
}

fn decode_entities(text: &str) -> String {
    RE_XML_ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") => u32::from_str_radix(&entity[2..], 16)
                    .ok()
                    .and_then(char::from_u32),
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    const DOCUMENT_XML: &str = r#"<?xml version="1.0"?>
<w:document><w:body>
<w:p><w:r><w:t>Newton&apos;s laws</w:t></w:r><w:r><w:t xml:space="preserve"> of motion</w:t></w:r></w:p>
<w:p><w:r><w:t>F</w:t><w:tab/><w:t>=</w:t><w:tab/><w:t>m &amp; a</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell &#233;</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;

    #[test]
    fn test_docx_xml_to_text() {
        let text = docx_xml_to_text(DOCUMENT_XML);
        assert_eq!(text, "Newton's laws of motion\nF\t=\tm & a\ncell é");
    }

    #[test]
    fn test_extract_docx_archive() {
        let bytes = build_docx(DOCUMENT_XML);
        let text = extract_text_blocking(DocumentFormat::Docx, &bytes).unwrap();
        assert!(text.starts_with("Newton's laws of motion"));
    }

    #[test]
    fn test_docx_without_document_xml() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(matches!(
            extract_text_blocking(DocumentFormat::Docx, &bytes),
            Err(IngestError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_extract_txt() {
        let text = extract_text_blocking(DocumentFormat::Txt, "plain notes".as_bytes()).unwrap();
        assert_eq!(text, "plain notes");
        assert!(matches!(
            extract_text_blocking(DocumentFormat::Txt, &[0xff, 0xfe, 0x00]),
            Err(IngestError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_extract_invalid_pdf() {
        assert!(matches!(
            extract_text_blocking(DocumentFormat::Pdf, b"definitely not a pdf"),
            Err(IngestError::ExtractionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_text_async() {
        let text = extract_text(DocumentFormat::Txt, b"async".to_vec()).await.unwrap();
        assert_eq!(text, "async");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt; b &gt; c"), "a < b > c");
        assert_eq!(decode_entities("&#x41;&#66;"), "AB");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }
}
