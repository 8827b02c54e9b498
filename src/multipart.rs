//! `multipart/form-data` decoding for the request view.
//!
//! The body is already buffered, so it is fed to `multer` as a one-chunk
//! stream and driven to completion on the spot. Nothing is written to disk.

use std::convert::Infallible;

use bytes::Bytes;
use futures::executor::block_on;
use futures::stream;
use multer::Multipart;

/// One part of a multipart body.
#[derive(Clone, Debug)]
pub(crate) struct Part {
    pub(crate) name: String,
    pub(crate) filename: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) data: Bytes,
}

/// The `boundary` parameter of a `multipart/form-data` content type.
pub(crate) fn boundary(content_type: &str) -> Option<String> {
    multer::parse_boundary(content_type).ok()
}

/// Decodes every part of `body`. Parts without a field name are skipped; a
/// malformed body fails as a whole.
pub(crate) fn parse(body: Bytes, boundary: &str) -> Result<Vec<Part>, multer::Error> {
    let chunks = stream::iter([Ok::<_, Infallible>(body)]);
    let mut multipart = Multipart::new(chunks, boundary);

    // Every poll is served from memory, so this never parks the thread.
    block_on(async move {
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else { continue };
            let filename = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await?;
            parts.push(Part { name, filename, content_type, data });
        }
        Ok(parts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\
        \r\n\
        holiday\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        line one\r\nline two\r\n\
        --XyZ--\r\n";

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(boundary("multipart/form-data; boundary=XyZ").as_deref(), Some("XyZ"));
        assert_eq!(boundary("application/json"), None);
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn splits_fields_and_files() {
        let parts = parse(Bytes::from_static(BODY.as_bytes()), "XyZ").unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name, "title");
        assert!(parts[0].filename.is_none());
        assert_eq!(&parts[0].data[..], b"holiday");

        assert_eq!(parts[1].filename.as_deref(), Some("a.txt"));
        assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));
        assert_eq!(&parts[1].data[..], b"line one\r\nline two");
    }

    #[test]
    fn quoted_filename_keeps_its_semicolon() {
        let body = "--b1\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"q3; final.csv\"\r\n\
            Content-Type: text/csv\r\n\r\n\
            a,b\r\n\
            --b1--\r\n";
        let parts = parse(Bytes::from_static(body.as_bytes()), "b1").unwrap();
        assert_eq!(parts[0].name, "file");
        assert_eq!(parts[0].filename.as_deref(), Some("q3; final.csv"));
    }

    #[test]
    fn boundary_text_inside_a_line_is_data() {
        let body = "--b1\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\r\n\
            x --b1x not a delimiter --b1\r\n\
            --b1--\r\n";
        let parts = parse(Bytes::from_static(body.as_bytes()), "b1").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0].data[..], b"x --b1x not a delimiter --b1");
    }

    #[test]
    fn truncated_body_is_an_error() {
        let body = "--b1\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\r\n\
            never closed";
        assert!(parse(Bytes::from_static(body.as_bytes()), "b1").is_err());
    }
}
