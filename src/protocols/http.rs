//! HTTP/1.1 request-line parsing (RFC 9112), first token and URI only.
//! Full header/body parsing is out of scope — the core only needs enough
//! to classify a request and extract its target URI.

use super::HttpMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    pub is_request: bool,
    pub method: HttpMethod,
    pub uri: Option<String>,
}

const RECOGNIZED: &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE"];

/// Classifies `payload` as an HTTP request or response. A message is a
/// request iff `dst_port == 80` and its first whitespace-delimited token
/// is a recognized method; otherwise it is a response (method `Unknown`,
/// no URI).
pub fn parse(payload: &[u8], dst_port: u16) -> HttpMessage {
    let text = String::from_utf8_lossy(payload);
    let mut parts = text.splitn(3, ' ');
    let token = parts.next().unwrap_or("");

    if dst_port == 80 && RECOGNIZED.contains(&token) {
        let uri = parts.next().map(|s| s.to_string());
        HttpMessage { is_request: true, method: HttpMethod::from_token(token), uri }
    } else {
        HttpMessage { is_request: false, method: HttpMethod::Unknown, uri: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_get_request_on_port_80() {
        let payload = b"GET /gslb?tver=2&id=369215617&cp=1 HTTP/1.1\r\nHost: x\r\n\r\n";
        let msg = parse(payload, 80);
        assert!(msg.is_request);
        assert_eq!(msg.method, HttpMethod::Get);
        assert_eq!(msg.uri.as_deref(), Some("/gslb?tver=2&id=369215617&cp=1"));
    }

    #[test]
    fn non_port_80_is_a_response() {
        let payload = b"GET / HTTP/1.1\r\n\r\n";
        let msg = parse(payload, 8080);
        assert!(!msg.is_request);
        assert_eq!(msg.method, HttpMethod::Unknown);
    }

    #[test]
    fn unrecognized_token_is_a_response() {
        let payload = b"HTTP/1.1 200 OK\r\n\r\n";
        let msg = parse(payload, 80);
        assert!(!msg.is_request);
    }
}
