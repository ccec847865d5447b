use std::path::{Path, PathBuf};

use scanner_core::{find_matches, ConfigurationError, SnapshotFormat};
use thiserror::Error;

use crate::format::{FormatRequest, SnapshotFormatter};
use crate::persist::{AtomicFileWriter, PersistError};
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export for {0}")]
    NothingToExport(String),
    #[error("{0} is not a file path")]
    InvalidPath(PathBuf),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// `path` with the format's extension added when it has none.
pub fn export_path(path: &Path, format: SnapshotFormat) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

/// Renders `request` and writes it to `path`, replacing any existing file.
pub fn write_export(
    formatter: &dyn SnapshotFormatter,
    request: &FormatRequest<'_>,
    path: &Path,
) -> Result<PathBuf, ExportError> {
    let target = export_path(path, request.format);
    let filename = target
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ExportError::InvalidPath(target.clone()))?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    AtomicFileWriter::new(dir)
        .write(filename, &formatter.render(request))
        .map_err(ExportError::from)
}

/// Every line of `text` that holds part of a match for `term`, once each and
/// in order, joined by newlines.
pub fn matching_lines(text: &str, term: &str) -> Result<String, ConfigurationError> {
    let mut lines: Vec<(usize, usize)> = Vec::new();
    for hit in find_matches(text, term)? {
        let start = text[..hit.start].rfind('\n').map_or(0, |idx| idx + 1);
        let end = text[hit.end..]
            .find('\n')
            .map_or(text.len(), |idx| hit.end + idx);
        match lines.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => lines.push((start, end)),
        }
    }
    Ok(lines
        .iter()
        .map(|&(start, end)| &text[start..end])
        .collect::<Vec<_>>()
        .join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DefaultFormatter;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn request(content: &str, format: SnapshotFormat, strip_tags: bool) -> FormatRequest<'_> {
        let captured_at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        FormatRequest {
            job: "news",
            captured_at,
            content,
            format,
            strip_tags,
        }
    }

    #[test]
    fn missing_extension_follows_the_format() {
        assert_eq!(
            export_path(Path::new("out/report"), SnapshotFormat::Csv),
            PathBuf::from("out/report.csv")
        );
        assert_eq!(
            export_path(Path::new("out/report.log"), SnapshotFormat::Json),
            PathBuf::from("out/report.log")
        );
    }

    #[test]
    fn export_writes_formatted_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("saved");
        let written = write_export(
            &DefaultFormatter,
            &request("<h2>One</h2>\n\n<h2>Two</h2>\n\n", SnapshotFormat::Text, true),
            &path,
        )
        .unwrap();

        assert_eq!(written, temp.path().join("saved.txt"));
        assert_eq!(fs::read_to_string(&written).unwrap(), "One\n\nTwo");
    }

    #[test]
    fn export_replaces_an_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("saved.txt");
        fs::write(&path, "old").unwrap();
        write_export(
            &DefaultFormatter,
            &request("new", SnapshotFormat::Text, false),
            &path,
        )
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn matching_lines_are_listed_once() {
        let text = "alpha news\nbeta\nnews and news\ngamma";
        assert_eq!(
            matching_lines(text, "news").unwrap(),
            "alpha news\nnews and news"
        );
        assert_eq!(matching_lines(text, "s\nb").unwrap(), "alpha news\nbeta");
        assert_eq!(matching_lines(text, "delta").unwrap(), "");
        assert_eq!(
            matching_lines(text, ""),
            Err(ConfigurationError::EmptySearchTerm)
        );
    }
}
