//! Static file serving from a document root.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use tokio::io::AsyncReadExt;

use crate::handler::error_page::write_error_page;
use crate::handler::{Handler, SERVER_NAME, http_date, log_access};
use crate::http::mime::content_type_for;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::status::StatusCode;

/// Serves files below `root`.
///
/// Directory-style paths (ending in `/`) are redirected to their
/// `index.html`. Only `GET` over HTTP/1.0 or HTTP/1.1 is served.
#[derive(Debug, Clone)]
pub struct FileServer {
    root: PathBuf,
}

impl FileServer {
    /// Fails if `root` does not exist or is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let meta = std::fs::metadata(&root).map_err(|e| {
            io::Error::new(e.kind(), format!("invalid dir path: {}", root.display()))
        })?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid dir path: {}", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Maps a decoded request path onto the file system below the root.
    pub fn resolve(&self, request_path: &str) -> PathBuf {
        self.root.join(clean_path(request_path))
    }

    fn fail(&self, request: &Request, response: &mut Response, status: StatusCode) {
        response.set_status(status);
        write_error_page(response);
        log_access(request, response);
    }
}

/// Lexically resolves `.` and `..` so the result never climbs above `/`.
///
/// ```
/// # use ferrule::handler::files::clean_path;
/// # use std::path::PathBuf;
/// assert_eq!(clean_path("/a/./b/../c.txt"), PathBuf::from("a/c.txt"));
/// assert_eq!(clean_path("/../../etc/passwd"), PathBuf::from("etc/passwd"));
/// ```
pub fn clean_path(request_path: &str) -> PathBuf {
    let mut clean = PathBuf::new();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                clean.pop();
            }
            s => clean.push(s),
        }
    }
    clean
}

#[async_trait]
impl Handler for FileServer {
    async fn handle(&self, request: &Request, response: &mut Response) {
        let path = request.path();

        if path.ends_with('/') {
            response.set_status(StatusCode::MovedPermanently);
            response.headers.set("Location", format!("{path}index.html"));
            response.headers.set("Content-Length", "0");
            let result = response
                .write_status_line()
                .and_then(|_| response.write_header());
            if let Err(e) = result {
                tracing::warn!(path, error = %e, "Failed to write redirect");
            }
            log_access(request, response);
            return;
        }

        response.headers.set("Server", SERVER_NAME);
        response.headers.set("Date", http_date());

        // Decode before cleaning so an escaped `..` is still contained.
        let path = match percent_decode_str(path).decode_utf8() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(path, error = %e, "Request path is not valid UTF-8");
                return self.fail(request, response, StatusCode::NotFound);
            }
        };

        let full_path = self.resolve(&path);
        let mut file = match tokio::fs::File::open(&full_path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %full_path.display(), error = %e, "Failed to open file");
                return self.fail(request, response, StatusCode::NotFound);
            }
        };

        if request.version != "HTTP/1.1" && request.version != "HTTP/1.0" {
            return self.fail(request, response, StatusCode::HttpVersionNotSupported);
        }
        response.version = request.version.clone();

        if request.method != Method::GET {
            return self.fail(request, response, StatusCode::MethodNotAllowed);
        }

        let mut contents = Vec::new();
        if let Err(e) = file.read_to_end(&mut contents).await {
            tracing::debug!(path = %full_path.display(), error = %e, "Failed to read file");
            return self.fail(request, response, StatusCode::NotFound);
        }

        let content_type = content_type_for(&path);
        if let Err(e) = response.send(StatusCode::Ok, &content_type, contents) {
            tracing::warn!(path = %path, error = %e, "Failed to write file response");
        }
        log_access(request, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_drops_empty_and_dot_segments() {
        assert_eq!(clean_path("/"), PathBuf::new());
        assert_eq!(clean_path("//a//b/"), PathBuf::from("a/b"));
        assert_eq!(clean_path("/a/b/../../.."), PathBuf::new());
    }

    #[test]
    fn new_rejects_missing_root() {
        let err = FileServer::new("/definitely/not/a/real/dir").unwrap_err();
        assert!(err.to_string().contains("invalid dir path"));
    }
}
