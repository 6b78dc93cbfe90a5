use async_trait::async_trait;

use crate::handler::{Handler, SERVER_NAME, http_date, log_access};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::StatusCode;

/// Answers with a small HTML page for whatever status the response carries.
///
/// A response without a status is answered as 500.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler;

#[async_trait]
impl Handler for ErrorHandler {
    async fn handle(&self, request: &Request, response: &mut Response) {
        write_error_page(response);
        log_access(request, response);
    }
}

/// Serializes an error page into `response`.
///
/// Usable without a parsed request, e.g. when the start line was garbage.
pub fn write_error_page(response: &mut Response) {
    let status = *response.status.get_or_insert(StatusCode::InternalServerError);

    // An HTTP/1.0 peer gets its own version back; anything else gets 1.1.
    if response.version.is_empty() && response.peer_version.as_deref() == Some("HTTP/1.0") {
        response.version = "HTTP/1.0".to_string();
    }

    response.headers.set("Server", SERVER_NAME);
    response.headers.set("Date", http_date());
    response.set_body("text/html", render(status));

    let result = response
        .write_status_line()
        .and_then(|_| response.write_header())
        .and_then(|_| response.write_body());

    if let Err(e) = result {
        tracing::warn!(status = status.as_u16(), error = %e, "Failed to write error page");
    }
}

fn render(status: StatusCode) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n\t<body>\n\t\t<h1>{}</h1>\n\t</body>\n</html>",
        status.reason_phrase()
    )
}
