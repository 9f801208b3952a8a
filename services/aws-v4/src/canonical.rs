// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Canonical request construction.
//!
//! ```text
//! METHOD
//! canonical-uri
//! canonical-query-string
//! canonical-headers (one `name:value` line each)
//!
//! signed-header-names
//! payload-hash
//! ```
//!
//! Every ordering here compares raw bytes, so the output does not depend on
//! locale or platform.

use crate::constants::{AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, IGNORED_HEADERS};
use awsign_core::hash::hex_sha256;
use awsign_core::{Error, Result};
use http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use std::fmt::{Display, Formatter};

/// How the request path is turned into the canonical URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriEncoding {
    /// Percent-encode the already encoded path a second time.
    pub double_url_encode: bool,
    /// Remove `.` and `..` segments before encoding.
    pub normalize_path: bool,
}

impl Default for UriEncoding {
    fn default() -> Self {
        Self {
            double_url_encode: true,
            normalize_path: true,
        }
    }
}

/// Build the canonical URI of `path`.
///
/// The path is decoded first and every segment encoded again with the
/// unreserved set, so `/a b` and `/a%20b` share one canonical form.
pub fn canonical_uri(path: &str, encoding: UriEncoding) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let path = if encoding.normalize_path {
        remove_dot_segments(&decoded)
    } else {
        decoded.into_owned()
    };

    let path = if path.is_empty() { "/" } else { path.as_str() };
    let encoded = utf8_percent_encode(path, &AWS_URI_ENCODE_SET).to_string();
    if encoding.double_url_encode {
        utf8_percent_encode(&encoded, &AWS_URI_ENCODE_SET).to_string()
    } else {
        encoded
    }
}

/// RFC 3986 dot segment removal. Empty segments and the trailing slash are kept.
fn remove_dot_segments(path: &str) -> String {
    let relative = path.strip_prefix('/').unwrap_or(path);

    let mut segments: Vec<&str> = Vec::new();
    let mut ends_with_dir = false;
    for segment in relative.split('/') {
        match segment {
            "." => ends_with_dir = true,
            ".." => {
                segments.pop();
                ends_with_dir = true;
            }
            s => {
                segments.push(s);
                ends_with_dir = false;
            }
        }
    }
    if ends_with_dir && segments.last() != Some(&"") {
        segments.push("");
    }

    format!("/{}", segments.join("/"))
}

/// Percent-encode every key and value, then sort by encoded key and value.
///
/// The result is what goes on the wire and into the canonical query string.
pub fn encode_query(query: &[(String, String)]) -> Vec<(String, String)> {
    let mut encoded: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();
    // Tuple of Strings orders by key bytes, then value bytes.
    encoded.sort();
    encoded
}

/// Join encoded and sorted pairs, keeping `key=` for empty values.
pub fn canonical_query_string(encoded: &[(String, String)]) -> String {
    let mut s = String::with_capacity(encoded.iter().map(|(k, v)| k.len() + v.len() + 2).sum());
    for (idx, (k, v)) in encoded.iter().enumerate() {
        if idx > 0 {
            s.push('&');
        }
        s.push_str(k);
        s.push('=');
        s.push_str(v);
    }
    s
}

/// Trim a header value and collapse runs of spaces and tabs into one space,
/// except inside double quoted strings.
pub fn normalize_header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_quotes = false;
    let mut pending_space = false;

    for c in value.trim().chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        }
        if !in_quotes && (c == ' ' || c == '\t') {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    out
}

/// Lower-cased, normalized and sorted headers that take part in the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHeaders {
    entries: Vec<(String, String)>,
}

impl CanonicalHeaders {
    /// Collect the signable headers of a request.
    ///
    /// Repeated headers are joined with `,` in the order they were added.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let mut entries = Vec::with_capacity(headers.keys_len());
        for name in headers.keys() {
            // http already stores header names lower-cased.
            let name = name.as_str();
            if IGNORED_HEADERS.contains(&name) {
                continue;
            }

            let mut value = String::new();
            for (idx, v) in headers.get_all(name).iter().enumerate() {
                let v = std::str::from_utf8(v.as_bytes()).map_err(|e| {
                    Error::request_invalid(format!("header {name} is not valid utf-8"))
                        .with_source(e)
                })?;
                if idx > 0 {
                    value.push(',');
                }
                value.push_str(&normalize_header_value(v));
            }
            entries.push((name.to_string(), value));
        }
        entries.sort();

        Ok(Self { entries })
    }

    /// `;` joined header names, as used in `SignedHeaders`.
    pub fn signed_headers(&self) -> String {
        self.entries
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Header names in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Canonical value of a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl Display for CanonicalHeaders {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (k, v) in &self.entries {
            writeln!(f, "{k}:{v}")?;
        }
        Ok(())
    }
}

/// CanonicalRequest is the string a SigV4 or SigV4a signature is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    uri: String,
    query: String,
    headers: CanonicalHeaders,
    payload_hash: String,
}

impl CanonicalRequest {
    /// Assemble a canonical request.
    ///
    /// `encoded_query` must come from [`encode_query`].
    pub fn new(
        method: &http::Method,
        path: &str,
        encoded_query: &[(String, String)],
        headers: CanonicalHeaders,
        encoding: UriEncoding,
        payload_hash: &str,
    ) -> Self {
        Self {
            method: method.as_str().to_string(),
            uri: canonical_uri(path, encoding),
            query: canonical_query_string(encoded_query),
            headers,
            payload_hash: payload_hash.to_string(),
        }
    }

    /// Canonical URI line.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Canonical query string line.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Signed headers.
    pub fn headers(&self) -> &CanonicalHeaders {
        &self.headers
    }

    /// Hex encoded SHA-256 of the canonical request, the last line of the
    /// string to sign.
    pub fn hashed(&self) -> String {
        hex_sha256(self.to_string().as_bytes())
    }
}

impl Display for CanonicalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.uri)?;
        writeln!(f, "{}", self.query)?;
        // Each header line ends with a newline, then one blank line.
        writeln!(f, "{}", self.headers)?;
        writeln!(f, "{}", self.headers.signed_headers())?;
        write!(f, "{}", self.payload_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awsign_core::hash::EMPTY_STRING_SHA256;
    use http::HeaderValue;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;
    use test_case::test_case;

    const DOUBLE: UriEncoding = UriEncoding {
        double_url_encode: true,
        normalize_path: true,
    };
    const SINGLE: UriEncoding = UriEncoding {
        double_url_encode: false,
        normalize_path: false,
    };

    #[test_case("", DOUBLE, "/"; "empty path")]
    #[test_case("/", DOUBLE, "/"; "root")]
    #[test_case("/a b", SINGLE, "/a%20b"; "space single")]
    #[test_case("/a%20b", SINGLE, "/a%20b"; "encoded space single")]
    #[test_case("/a b", DOUBLE, "/a%2520b"; "space double")]
    #[test_case("/%E2%82%AC", SINGLE, "/%E2%82%AC"; "unicode single")]
    #[test_case("/%E2%82%AC", DOUBLE, "/%25E2%2582%25AC"; "unicode double")]
    #[test_case("/foo/../bar", DOUBLE, "/bar"; "dot dot normalized")]
    #[test_case("/foo/./bar/", DOUBLE, "/foo/bar/"; "dot normalized")]
    #[test_case("/foo/..", DOUBLE, "/"; "dot dot at end")]
    #[test_case("/foo/../bar", SINGLE, "/foo/../bar"; "not normalized")]
    #[test_case("/foo//bar", DOUBLE, "/foo//bar"; "empty segment kept")]
    #[test_case("/-._~", DOUBLE, "/-._~"; "unreserved")]
    fn test_canonical_uri(path: &str, encoding: UriEncoding, expected: &str) {
        assert_eq!(canonical_uri(path, encoding), expected);
    }

    #[test_case("test  test", "test test"; "double space")]
    #[test_case("  padded\t", "padded"; "trimmed")]
    #[test_case("a \t b", "a b"; "mixed whitespace")]
    #[test_case("a  \"b  c\"  d", "a \"b  c\" d"; "quoted kept")]
    #[test_case("", ""; "empty")]
    fn test_normalize_header_value(input: &str, expected: &str) {
        assert_eq!(normalize_header_value(input), expected);
    }

    #[test]
    fn test_canonical_headers() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.com"));
        headers.insert("X-Amz-Meta-B", HeaderValue::from_static("  b  value "));
        headers.append("x-amz-meta-a", HeaderValue::from_static("first"));
        headers.append("x-amz-meta-a", HeaderValue::from_static("second  one"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("x-amzn-trace-id", HeaderValue::from_static("Root=1"));

        let canonical = CanonicalHeaders::from_headers(&headers)?;
        assert_eq!(
            canonical.to_string(),
            "host:example.com\nx-amz-meta-a:first,second one\nx-amz-meta-b:b value\n"
        );
        assert_eq!(canonical.signed_headers(), "host;x-amz-meta-a;x-amz-meta-b");
        assert_eq!(canonical.get("x-amz-meta-b"), Some("b value"));
        assert_eq!(canonical.get("connection"), None);
        Ok(())
    }

    #[test]
    fn test_canonical_query() {
        let query = vec![
            ("prefix".to_string(), "CI/".to_string()),
            ("list-type".to_string(), "2".to_string()),
            ("flag".to_string(), "".to_string()),
            ("b".to_string(), "2".to_string()),
            ("b".to_string(), "1".to_string()),
            ("a b".to_string(), "c+d".to_string()),
            ("Z".to_string(), "upper".to_string()),
        ];

        assert_eq!(
            canonical_query_string(&encode_query(&query)),
            "Z=upper&a%20b=c%2Bd&b=1&b=2&flag=&list-type=2&prefix=CI%2F"
        );
    }

    /// Any permutation of the same pairs gives the same canonical query.
    #[quickcheck]
    fn prop_query_order_independent(query: Vec<(String, String)>, seed: usize) -> bool {
        let expected = canonical_query_string(&encode_query(&query));

        let mut shuffled = query.clone();
        shuffled.reverse();
        if !shuffled.is_empty() {
            let mid = seed % shuffled.len();
            shuffled.rotate_left(mid);
        }

        canonical_query_string(&encode_query(&shuffled)) == expected
    }

    #[test]
    fn test_canonical_request_layout() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.amazonaws.com"));
        headers.insert("x-amz-date", HeaderValue::from_static("20150830T123600Z"));
        let headers = CanonicalHeaders::from_headers(&headers)?;

        let creq = CanonicalRequest::new(
            &http::Method::GET,
            "/",
            &[],
            headers,
            UriEncoding::default(),
            EMPTY_STRING_SHA256,
        );

        assert_eq!(
            creq.to_string(),
            "GET\n/\n\nhost:example.amazonaws.com\nx-amz-date:20150830T123600Z\n\nhost;x-amz-date\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            creq.hashed(),
            "bb579772317eb040ac9ed261061d46c1f17a8133879d6129b6e1c25292927e63"
        );
        Ok(())
    }
}
