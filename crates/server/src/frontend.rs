//! Static front-end assets.
//!
//! The browser UI lives in its own directory and is served read-only for
//! any path the API does not claim. Asset paths go through the same
//! confinement as the share, so traversal out of the front-end directory is
//! refused just the same.

use std::fs::{self, File};
use std::path::Path;

use tracing::debug;

use crate::files::{FileError, SharedRoot};

/// Default page served for `/` and for directory paths.
pub const DEFAULT_INDEX: &str = "index.html";

/// A front-end directory opened at startup.
#[derive(Debug)]
pub struct Frontend {
    root: SharedRoot,
    index: String,
}

/// An opened asset ready to be streamed.
#[derive(Debug)]
pub struct Asset {
    /// Open handle positioned at the start of the file.
    pub file: File,
    /// Size in bytes.
    pub size: u64,
    /// MIME type chosen from the file extension.
    pub content_type: &'static str,
}

impl Frontend {
    /// Open an existing front-end directory.
    ///
    /// Unlike the share, a missing directory is an error.
    pub fn open<P: AsRef<Path>>(dir: P, index: &str) -> Result<Self, FileError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FileError::NotFound(format!(
                "front-end directory: {}",
                dir.display()
            )));
        }

        Ok(Self {
            root: SharedRoot::open(dir)?,
            index: index.to_string(),
        })
    }

    /// Canonical path of the front-end directory.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Open the asset named by a decoded request path.
    ///
    /// Directories (including `/`) serve their index page.
    pub fn asset(&self, request_path: &str) -> Result<Asset, FileError> {
        let relative = request_path.trim_start_matches('/');
        let mut resolved = self.root.resolve(relative)?;

        if resolved.as_path().is_dir() {
            let index = if resolved.is_root() {
                self.index.clone()
            } else {
                format!("{}/{}", resolved.relative(), self.index)
            };
            resolved = self.root.resolve(&index)?;
        }

        let metadata =
            fs::metadata(resolved.as_path()).map_err(|e| FileError::from_io(e, relative))?;
        if !metadata.is_file() {
            return Err(FileError::NotFound(request_path.to_string()));
        }

        let file = File::open(resolved.as_path()).map_err(|e| FileError::from_io(e, relative))?;
        debug!(path = %resolved.relative(), "Serving front-end asset");

        Ok(Asset {
            file,
            size: metadata.len(),
            content_type: content_type_for(resolved.as_path()),
        })
    }
}

/// MIME type for common front-end file extensions.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Percent-decode a request path. `None` for malformed escapes or non-UTF-8.
pub fn decode_request_path(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn create_frontend(base: &Path) -> Frontend {
        let dir = base.join("frontend");
        fs::create_dir_all(dir.join("js")).unwrap();
        fs::create_dir_all(dir.join("docs")).unwrap();
        fs::write(dir.join("index.html"), "<h1>LanShare</h1>").unwrap();
        fs::write(dir.join("js/app.js"), "console.log(1)").unwrap();
        fs::write(dir.join("docs/index.html"), "docs").unwrap();
        fs::write(base.join("secret.txt"), "secret").unwrap();
        Frontend::open(&dir, DEFAULT_INDEX).unwrap()
    }

    fn read_asset(mut asset: Asset) -> String {
        let mut contents = String::new();
        asset.file.read_to_string(&mut contents).unwrap();
        contents
    }

    #[test]
    fn test_root_serves_index() {
        let temp_dir = TempDir::new().unwrap();
        let frontend = create_frontend(temp_dir.path());

        let asset = frontend.asset("/").unwrap();
        assert_eq!(asset.content_type, "text/html; charset=utf-8");
        assert_eq!(asset.size, 17);
        assert_eq!(read_asset(asset), "<h1>LanShare</h1>");
    }

    #[test]
    fn test_nested_asset_and_directory_index() {
        let temp_dir = TempDir::new().unwrap();
        let frontend = create_frontend(temp_dir.path());

        let script = frontend.asset("/js/app.js").unwrap();
        assert_eq!(script.content_type, "text/javascript; charset=utf-8");
        assert_eq!(read_asset(script), "console.log(1)");

        assert_eq!(read_asset(frontend.asset("/docs").unwrap()), "docs");
    }

    #[test]
    fn test_traversal_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let frontend = create_frontend(temp_dir.path());

        assert!(matches!(
            frontend.asset("/../secret.txt"),
            Err(FileError::Forbidden(_))
        ));
    }

    #[test]
    fn test_missing_asset_and_index() {
        let temp_dir = TempDir::new().unwrap();
        let frontend = create_frontend(temp_dir.path());

        assert!(matches!(frontend.asset("/nope.css"), Err(FileError::NotFound(_))));
        // `js` has no index page
        assert!(matches!(frontend.asset("/js"), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent");

        assert!(matches!(
            Frontend::open(&missing, DEFAULT_INDEX),
            Err(FileError::NotFound(_))
        ));
        assert!(!missing.exists());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a/STYLE.CSS")), "text/css; charset=utf-8");
        assert_eq!(content_type_for(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_decode_request_path() {
        assert_eq!(
            decode_request_path("/my%20page.html").as_deref(),
            Some("/my page.html")
        );
        assert_eq!(decode_request_path("/%2e%2e/x").as_deref(), Some("/../x"));
        assert_eq!(decode_request_path("/bad%2"), None);
        assert_eq!(decode_request_path("/bad%zz"), None);
        assert_eq!(decode_request_path("/bad%+1"), None);
        assert_eq!(decode_request_path("/%ff"), None);
    }
}
