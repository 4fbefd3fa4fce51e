use actix_web::http::header::{HeaderMap, CONTENT_TYPE};
use bytes::BytesMut;

pub(crate) trait BufferWriter {
    fn write_to_buffer(&self, buffer: &mut BytesMut);
}

/// Whether the response is an HTML page the analytics tag can be attached to.
pub(crate) fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .get(..9)
                .is_some_and(|mime| mime.eq_ignore_ascii_case("text/html"))
        })
}
