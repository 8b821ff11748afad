//! # Response Body Decoding
//!
//! The transport hands back raw bytes. This module undoes any
//! `Content-Encoding` and turns the result into text using the charset
//! named in `Content-Type`.

use std::collections::HashMap;
use std::io::Read;

use bytes::Bytes;
use encoding_rs::Encoding;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

/// Decode a response body into text.
///
/// A body that cannot be decompressed is kept as received.
pub(crate) fn decode_body(raw: Bytes, headers: &HashMap<String, String>) -> String {
    let encoding = header(headers, "content-encoding")
        .map(|e| e.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let bytes = match decompress(&raw, &encoding) {
        Ok(Some(decoded)) => Bytes::from(decoded),
        Ok(None) => raw,
        Err(e) => {
            tracing::warn!("Failed to decode {} response body, keeping raw bytes: {}", encoding, e);
            raw
        }
    };

    decode_text(&bytes, header(headers, "content-type"))
}

fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// `Ok(None)` when the encoding is identity or one we leave alone.
fn decompress(raw: &[u8], encoding: &str) -> std::io::Result<Option<Vec<u8>>> {
    let mut out = Vec::new();
    match encoding {
        "gzip" | "x-gzip" => {
            GzDecoder::new(raw).read_to_end(&mut out)?;
        }
        "deflate" => {
            // Servers disagree on whether "deflate" means zlib-wrapped or raw.
            if ZlibDecoder::new(raw).read_to_end(&mut out).is_err() {
                out.clear();
                DeflateDecoder::new(raw).read_to_end(&mut out)?;
            }
        }
        "zstd" => {
            out = zstd::stream::decode_all(raw)?;
        }
        _ => return Ok(None),
    }
    Ok(Some(out))
}

fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    match encoding {
        Some(encoding) => {
            let (text, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                tracing::debug!("Response body contained invalid {} sequences", encoding.name());
            }
            text.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}
