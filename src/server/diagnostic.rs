use warp::{
    http::StatusCode,
    reply::{self, Reply, Response},
};

/// Placeholder rendered for absent query parameters.
pub const UNDEFINED: &str = "undefined";

/// The dashboard shows this text verbatim for every non-2xx response.
pub fn message(code: StatusCode, endpoint: &str, params: &str, extra: &str) -> String {
    format!(
        "Call to {} returned code {}.\n=> Parameters:\n{}\n=> Extra info:\n{}",
        endpoint,
        code.as_u16(),
        params,
        extra
    )
}

pub fn reply(code: StatusCode, endpoint: &str, params: &str, extra: &str) -> Response {
    reply::with_status(message(code, endpoint, params, extra), code).into_response()
}

pub fn param(value: Option<&String>) -> &str {
    value.map(String::as_str).unwrap_or(UNDEFINED)
}
