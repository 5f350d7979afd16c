//! File utilities for uploads and CLI ingestion.

use std::fs;
use std::path::Path;

use crate::models::DocumentFormat;

/// Read a file into memory, refusing anything above `max_size` bytes.
pub fn read_file_limited(path: &Path, max_size: u64) -> std::io::Result<Vec<u8>> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read(path)
}

/// True when the extension is one the ingestion pipeline can extract.
pub fn is_supported_document(path: &Path) -> bool {
    path.file_name()
        .map(|name| DocumentFormat::from_filename(&name.to_string_lossy()).is_ok())
        .unwrap_or(false)
}

/// Make an uploaded file name safe to store on disk.
///
/// Keeps only the final path component, replaces characters that are invalid
/// on common filesystems, and strips leading dots so the result is never a
/// hidden file or a relative path.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '-', '_']).trim_end_matches(['-', '_']);
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\essay.docx"), "essay.docx");
        assert_eq!(sanitize_filename("my lecture notes.pdf"), "my_lecture_notes.pdf");
        assert_eq!(sanitize_filename(".hidden.txt"), "hidden.txt");
        assert_eq!(sanitize_filename("what?.txt"), "what-.txt");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn test_is_supported_document() {
        assert!(is_supported_document(&PathBuf::from("/docs/a.pdf")));
        assert!(is_supported_document(&PathBuf::from("b.DOCX")));
        assert!(is_supported_document(&PathBuf::from("c.txt")));
        assert!(!is_supported_document(&PathBuf::from("d.md")));
        assert!(!is_supported_document(&PathBuf::from("Makefile")));
    }

    #[test]
    fn test_read_file_limited() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        assert_eq!(read_file_limited(file.path(), 100).unwrap(), b"0123456789");
        assert!(read_file_limited(file.path(), 5).is_err());
    }
}
