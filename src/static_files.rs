//! Static file serving for routes registered with
//! [`Router::serve_files`](crate::Router::serve_files).

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use http::StatusCode;
use tracing::{debug, warn};

use crate::context::RequestCtx;
use crate::handler::Handler;
use crate::router::FILEPATH_PARAM;

/// Serves files below a base directory.
///
/// The request's `filepath` parameter is resolved inside the base directory;
/// `..`, absolute and prefix components are refused so a request can never
/// escape it.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "wasm" => "application/wasm",
            _ => "application/octet-stream",
        }
    }

    /// Read the file addressed by `url_path`.
    ///
    /// Fails with `NotFound` for traversal attempts, directories and missing
    /// files; other I/O errors are passed through.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let bytes = fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}

impl Handler for StaticFiles {
    fn handle(&self, ctx: &mut RequestCtx) {
        let requested = ctx.param(FILEPATH_PARAM).unwrap_or("/").to_owned();
        match self.load(&requested) {
            Ok((bytes, content_type)) => {
                debug!(file = %requested, size = bytes.len(), "Serving static file");
                ctx.set_status(StatusCode::OK);
                ctx.set_content_type(content_type);
                ctx.set_body(bytes);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %requested, "Static file not found");
                ctx.error("Not Found", StatusCode::NOT_FOUND);
            }
            Err(e) => {
                warn!(file = %requested, error = %e, "Failed to read static file");
                ctx.error("Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_path_prevents_traversal() {
        let sf = StaticFiles::new("tests/staticdata");
        assert!(sf.map_path("../Cargo.toml").is_none());
        assert!(sf.map_path("/a/../../Cargo.toml").is_none());
        assert_eq!(
            sf.map_path("/css/./site.css"),
            Some(PathBuf::from("tests/staticdata/css/site.css"))
        );
    }

    #[test]
    fn test_content_type() {
        assert_eq!(
            StaticFiles::content_type(Path::new("a/INDEX.HTML")),
            "text/html; charset=utf-8"
        );
        assert_eq!(StaticFiles::content_type(Path::new("app.js")), "application/javascript");
        assert_eq!(
            StaticFiles::content_type(Path::new("blob")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let sf = StaticFiles::new(dir.path());
        let err = sf.load("/").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
