//! Checks run on the source directory before anything is rendered.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Extension of the files that must be present in the source directory.
const HTML_SUFFIX: &str = ".html";

/// A source directory that cannot be rendered.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("Source directory {} does not exist, nothing to render", .0.display())]
    MissingSourceDirectory(PathBuf),

    #[error("Permission denied accessing source directory {}, cannot render", .0.display())]
    SourceDirectoryPermissionDenied(PathBuf),

    #[error("No .html source files found in {}, nothing to render", .0.display())]
    NoHtmlSources(PathBuf),

    #[error("Permission denied listing source directory {}, cannot render", .0.display())]
    SourceListingPermissionDenied(PathBuf),

    #[error("Permission denied opening {}, cannot render", .0.display())]
    SourceFilePermissionDenied(PathBuf),

    #[error("Cannot read {}", .path.display())]
    SourceFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PreflightError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            // Same status as any other failure outside the permission checks
            PreflightError::MissingSourceDirectory(_)
            | PreflightError::SourceFileUnreadable { .. } => 1,
            PreflightError::SourceDirectoryPermissionDenied(_) => 2,
            PreflightError::NoHtmlSources(_) => 3,
            PreflightError::SourceListingPermissionDenied(_) => 4,
            PreflightError::SourceFilePermissionDenied(_) => 5,
        }
    }
}

/// Validate `src` and return the `*.html` files directly inside it, sorted.
pub fn check_source_dir(src: &Path) -> Result<Vec<PathBuf>, PreflightError> {
    match src.try_exists() {
        Ok(true) => {}
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(PreflightError::SourceDirectoryPermissionDenied(
                src.to_path_buf(),
            ))
        }
        Ok(false) | Err(_) => {
            return Err(PreflightError::MissingSourceDirectory(src.to_path_buf()))
        }
    }

    let sources = html_sources(src)?;
    if sources.is_empty() {
        return Err(PreflightError::NoHtmlSources(src.to_path_buf()));
    }

    for path in &sources {
        probe(path)?;
    }

    tracing::debug!("Found {} html sources in {}", sources.len(), src.display());
    Ok(sources)
}

/// List the entries named `*.html` directly inside `src`.
///
/// Directories with such a name are listed too; they fail the probe.
fn html_sources(src: &Path) -> Result<Vec<PathBuf>, PreflightError> {
    let entries = match fs::read_dir(src) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(PreflightError::SourceListingPermissionDenied(
                src.to_path_buf(),
            ))
        }
        // Not a directory, or vanished since the existence check
        Err(_) => return Ok(Vec::new()),
    };

    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            if e.kind() == ErrorKind::PermissionDenied {
                PreflightError::SourceListingPermissionDenied(src.to_path_buf())
            } else {
                PreflightError::SourceFileUnreadable {
                    path: src.to_path_buf(),
                    source: e,
                }
            }
        })?;

        let is_html = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(HTML_SUFFIX));

        if is_html {
            sources.push(entry.path());
        }
    }

    sources.sort();
    Ok(sources)
}

/// Open `path` and read its first character as UTF-8.
fn probe(path: &Path) -> Result<(), PreflightError> {
    let unreadable = |source: io::Error| {
        if source.kind() == ErrorKind::PermissionDenied {
            PreflightError::SourceFilePermissionDenied(path.to_path_buf())
        } else {
            PreflightError::SourceFileUnreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    let file = File::open(path).map_err(unreadable)?;

    // A UTF-8 character is at most 4 bytes
    let mut head = Vec::with_capacity(4);
    file.take(4).read_to_end(&mut head).map_err(unreadable)?;

    match std::str::from_utf8(&head) {
        Ok(_) => Ok(()),
        Err(e) if e.valid_up_to() > 0 => Ok(()),
        Err(_) => Err(unreadable(io::Error::new(
            ErrorKind::InvalidData,
            "stream did not contain valid UTF-8",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_directory() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("templates");

        let err = check_source_dir(&src).unwrap_err();

        assert!(matches!(err, PreflightError::MissingSourceDirectory(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn empty_directory_has_no_sources() {
        let temp = tempdir().unwrap();

        let err = check_source_dir(temp.path()).unwrap_err();

        assert!(matches!(err, PreflightError::NoHtmlSources(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn only_top_level_html_files_count() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("pages")).unwrap();
        fs::write(temp.path().join("pages/index.html"), "<p>").unwrap();
        fs::write(temp.path().join("index.HTML"), "<p>").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();

        let err = check_source_dir(temp.path()).unwrap_err();

        assert!(matches!(err, PreflightError::NoHtmlSources(_)));
    }

    #[test]
    fn file_as_source_dir_has_no_sources() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("templates");
        fs::write(&file, "").unwrap();

        let err = check_source_dir(&file).unwrap_err();

        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn returns_sorted_sources() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), "<h1>").unwrap();
        fs::write(temp.path().join("about.html"), "").unwrap();
        fs::write(temp.path().join("_base.html"), "ü").unwrap();
        fs::write(temp.path().join("style.css"), "").unwrap();

        let sources = check_source_dir(temp.path()).unwrap();

        assert_eq!(
            sources,
            vec![
                temp.path().join("_base.html"),
                temp.path().join("about.html"),
                temp.path().join("index.html"),
            ]
        );
    }

    #[test]
    fn first_character_may_be_followed_by_anything() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), [b'<', 0xff, 0xfe]).unwrap();

        assert!(check_source_dir(temp.path()).is_ok());
    }

    #[test]
    fn invalid_first_character_is_unreadable() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index.html");
        fs::write(&path, [0xff, b'<']).unwrap();

        let err = check_source_dir(temp.path()).unwrap_err();

        assert!(matches!(
            err,
            PreflightError::SourceFileUnreadable { path: ref p, .. } if *p == path
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn directory_named_html_is_unreadable() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("dir.html");
        fs::create_dir(&dir).unwrap();

        let err = check_source_dir(temp.path()).unwrap_err();

        assert!(matches!(
            err,
            PreflightError::SourceFileUnreadable { path: ref p, .. } if *p == dir
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn unreadable_message_leaves_cause_to_the_chain() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("index.html"), [0xff]).unwrap();

        let err = anyhow::Error::new(check_source_dir(temp.path()).unwrap_err());
        let rendered = format!("{:#}", err);

        assert_eq!(rendered.matches("valid UTF-8").count(), 1, "{}", rendered);
        assert!(rendered.starts_with("Cannot read "));
    }

    #[test]
    fn exit_codes_are_distinct_per_check() {
        let path = PathBuf::from("templates");
        let codes: Vec<u8> = [
            PreflightError::MissingSourceDirectory(path.clone()),
            PreflightError::SourceDirectoryPermissionDenied(path.clone()),
            PreflightError::NoHtmlSources(path.clone()),
            PreflightError::SourceListingPermissionDenied(path.clone()),
            PreflightError::SourceFilePermissionDenied(path),
        ]
        .iter()
        .map(PreflightError::exit_code)
        .collect();

        assert_eq!(codes, vec![1, 2, 3, 4, 5]);
    }

    // Root ignores permission bits. These run with `cargo test -- --ignored`
    // as a normal user and report a skip when run as root.
    #[cfg(unix)]
    fn skip_as_root(test: &str) -> bool {
        use std::os::unix::fs::MetadataExt;

        let root = fs::metadata("/proc/self").map(|m| m.uid() == 0).unwrap_or(false);
        if root {
            eprintln!("skipping {}: permission bits are not enforced for root", test);
        }
        root
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "needs a non-root user"]
    fn inaccessible_parent_is_directory_denied() {
        use std::os::unix::fs::PermissionsExt;

        if skip_as_root("inaccessible_parent_is_directory_denied") {
            return;
        }

        let temp = tempdir().unwrap();
        let parent = temp.path().join("locked");
        let src = parent.join("templates");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.html"), "<p>").unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o000)).unwrap();

        let err = check_source_dir(&src).unwrap_err();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(err, PreflightError::SourceDirectoryPermissionDenied(ref p) if *p == src));
        assert_eq!(err.exit_code(), 2);
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "needs a non-root user"]
    fn unreadable_file_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        if skip_as_root("unreadable_file_is_permission_denied") {
            return;
        }

        let temp = tempdir().unwrap();
        let path = temp.path().join("secret.html");
        fs::write(&path, "<p>").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        let err = check_source_dir(temp.path()).unwrap_err();

        assert!(matches!(err, PreflightError::SourceFilePermissionDenied(ref p) if *p == path));
        assert!(err.to_string().contains("secret.html"));
        assert_eq!(err.exit_code(), 5);
    }

    #[cfg(unix)]
    #[test]
    #[ignore = "needs a non-root user"]
    fn unlistable_directory_is_listing_denied() {
        use std::os::unix::fs::PermissionsExt;

        if skip_as_root("unlistable_directory_is_listing_denied") {
            return;
        }

        let temp = tempdir().unwrap();
        let src = temp.path().join("templates");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("index.html"), "<p>").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o300)).unwrap();

        let err = check_source_dir(&src).unwrap_err();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(err.exit_code(), 4);
    }
}
