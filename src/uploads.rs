use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;

/// Filename suffixes accepted for uploads. Checked by suffix only, never by
/// content sniffing.
const ALLOWED_EXTENSIONS: &[&str] = &["txt", "pdf", "png", "jpg", "jpeg", "gif"];

/// Whether a filename carries an allowed extension (case-insensitive).
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce an uploaded filename to a safe flat name: strip any path
/// components and keep only alphanumerics, dots, dashes and underscores.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

/// Write the uploaded bytes into the uploads directory under the sanitized
/// filename, then read the file back and return its base64 encoding.
/// Colliding filenames overwrite each other; no uniqueness guarantee.
pub fn store_upload(uploads_dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<String> {
    std::fs::create_dir_all(uploads_dir)?;
    let path = uploads_dir.join(sanitize_filename(filename));
    std::fs::write(&path, bytes)?;

    let stored = std::fs::read(&path)?;
    Ok(STANDARD.encode(stored))
}

/// Gate and store an upload in one step: `None` when the filename fails the
/// extension whitelist, otherwise the stored file's base64 payload.
pub fn process_upload(
    uploads_dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> std::io::Result<Option<String>> {
    if !allowed_file(filename) {
        return Ok(None);
    }
    store_upload(uploads_dir, filename, bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_file_accepts_whitelist() {
        for name in ["a.txt", "b.pdf", "c.png", "d.jpg", "e.jpeg", "f.gif"] {
            assert!(allowed_file(name), "{name} should be allowed");
        }
    }

    #[test]
    fn allowed_file_is_case_insensitive() {
        assert!(allowed_file("photo.PNG"));
        assert!(allowed_file("photo.JpEg"));
    }

    #[test]
    fn allowed_file_rejects_other_extensions() {
        assert!(!allowed_file("evil.exe"));
        assert!(!allowed_file("script.sh"));
        assert!(!allowed_file("noextension"));
    }

    #[test]
    fn allowed_file_checks_last_suffix_only() {
        assert!(allowed_file("double.exe.png"));
        assert!(!allowed_file("double.png.exe"));
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("dir\\evil.png"), "evil.png");
    }

    #[test]
    fn sanitize_drops_odd_characters() {
        assert_eq!(sanitize_filename("my photo (1).png"), "myphoto1.png");
    }

    #[test]
    fn store_upload_round_trips_base64() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = b"\x89PNG\r\nfake image bytes";
        let encoded = store_upload(tmp.path(), "pic.png", bytes).unwrap();
        assert_eq!(encoded, STANDARD.encode(bytes));
        // The raw file is kept on disk alongside the encoded copy
        assert!(tmp.path().join("pic.png").exists());
    }

    #[test]
    fn process_upload_rejects_disallowed_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let result = process_upload(tmp.path(), "evil.exe", b"MZ").unwrap();
        assert!(result.is_none());
        assert!(!tmp.path().join("evil.exe").exists());
    }

    #[test]
    fn process_upload_stores_allowed_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let result = process_upload(tmp.path(), "ok.gif", b"GIF89a").unwrap();
        assert_eq!(result, Some(STANDARD.encode(b"GIF89a")));
    }

    #[test]
    fn store_upload_overwrites_colliding_names() {
        let tmp = tempfile::tempdir().unwrap();
        store_upload(tmp.path(), "pic.png", b"first").unwrap();
        let encoded = store_upload(tmp.path(), "pic.png", b"second").unwrap();
        assert_eq!(encoded, STANDARD.encode(b"second"));
    }
}
