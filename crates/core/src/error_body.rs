//! Extraction of the few fields the engine reads from S3 XML bodies.
//!
//! Only error codes (`<Error><Code>`) and multipart upload ids are needed, so
//! this is a streaming scan for a named element rather than a full
//! deserializer.

use quick_xml::Reader;
use quick_xml::events::Event;

/// Error code S3 returns (with a 400 status) when it gave up waiting for the
/// request body
pub const REQUEST_TIMEOUT_CODE: &str = "RequestTimeout";

/// Error codes that indicate a transient server-side problem even when the
/// HTTP status says otherwise
pub const TRANSIENT_SERVER_CODES: &[&str] = &[
    "InternalError",
    "ServiceUnavailable",
    "SlowDown",
    "OperationAborted",
];

/// Text of the first element called `name`, anywhere in the document.
///
/// Returns `None` for empty bodies, non-XML bodies and documents without
/// the element.
pub fn element_text(body: &[u8], name: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == name.as_bytes() => {
                return read_text(&mut reader);
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn read_text(reader: &mut Reader<&[u8]>) -> Option<String> {
    let mut text = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let decoded = e.decode().ok()?;
                let unescaped = quick_xml::escape::unescape(&decoded).ok()?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(_)) => return Some(text),
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Error code of an S3 `<Error>` document
pub fn error_code(body: &[u8]) -> Option<String> {
    element_text(body, "Code").filter(|code| !code.is_empty())
}

/// Human-readable message of an S3 `<Error>` document
pub fn error_message(body: &[u8]) -> Option<String> {
    element_text(body, "Message").filter(|msg| !msg.is_empty())
}

/// True when the body is an S3 `<Error>` document
pub fn is_error_document(body: &[u8]) -> bool {
    if body.is_empty() {
        return false;
    }

    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => return e.local_name().as_ref() == b"Error",
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_minimal_body() {
        let body = b"<Error><Code>RequestTimeout</Code></Error>";
        assert_eq!(error_code(body).as_deref(), Some(REQUEST_TIMEOUT_CODE));
    }

    #[test]
    fn test_error_code_with_declaration_and_message() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The specified key does not exist.</Message>
  <RequestId>4442587FB7D0A2F9</RequestId>
</Error>"#;
        assert_eq!(error_code(body).as_deref(), Some("NoSuchKey"));
        assert_eq!(
            error_message(body).as_deref(),
            Some("The specified key does not exist.")
        );
        assert!(is_error_document(body));
    }

    #[test]
    fn test_error_code_absent() {
        assert_eq!(error_code(b""), None);
        assert_eq!(error_code(b"not xml at all"), None);
        assert_eq!(error_code(b"<Error><Message>x</Message></Error>"), None);
        assert_eq!(error_code(b"<Error><Code></Code></Error>"), None);
    }

    #[test]
    fn test_upload_id_lookup() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Bucket>mybucket</Bucket>
  <Key>big.bin</Key>
  <UploadId>VXBsb2FkIElE</UploadId>
</InitiateMultipartUploadResult>"#;
        assert_eq!(element_text(body, "UploadId").as_deref(), Some("VXBsb2FkIElE"));
        assert!(!is_error_document(body));
    }
}
