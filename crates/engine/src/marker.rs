// reqdebug - Request-scoped debugging toolkit
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Coloured markers
//!
//! A marker is a small coloured label derived from a value's hash. The same value
//! always gets the same colour, which makes it easy to spot whether content that
//! was reloaded in the background actually changed.

use chrono::Utc;
use md5::{Digest, Md5};
use rand::Rng;

use crate::{html, DumpValue};

const BLOCK_STYLES: [(&str, &str); 5] = [
    ("font-size", "12px"),
    ("text-transform", "uppercase"),
    ("font-family", "monospace"),
    ("text-align", "center"),
    ("margin", "5px auto"),
];

/// A rendered marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// HTML element
    pub html: String,
    /// MD5 hash of the value
    pub hash: String,
    /// Label text
    pub text: String,
    /// Label colour, `#` followed by six hex digits
    pub color: String,
}

/// Build a marker for `data`, or a random marker when there is no data
///
/// `styles` override the label's default inline styles.
pub fn marker(data: Option<&DumpValue>, styles: &[(&str, &str)]) -> Marker {
    let (hash, text) = match data.filter(|value| **value != DumpValue::Null) {
        Some(value) => {
            let hash = md5_hex(value.to_json().to_string().as_bytes());
            let text = match value.scalar_text() {
                Some(scalar) => format!("{}: {scalar}", value.type_name()),
                None => format!("{}: {hash}", value.type_name()),
            };
            (hash, text)
        }
        None => {
            let seed = format!("{}{}", rand::rng().random_range(1000..10000), Utc::now().timestamp());
            let hash = md5_hex(seed.as_bytes());
            (hash.clone(), hash)
        }
    };

    let color = format!("#{}{}", &hash[..3], &hash[hash.len() - 3..]);
    let defaults = [
        ("display", "inline-block"),
        ("background", color.as_str()),
        ("color", "#fff"),
        ("min-width", "250px"),
        ("max-width", "400px"),
        ("font-size", "12px"),
        ("text-transform", "uppercase"),
        ("font-family", "monospace"),
        ("text-align", "center"),
        ("margin", "5px auto"),
        ("border-radius", "3px"),
        ("padding", "4px 14px"),
        ("text-shadow", "0 0 1px #000, 0 0 5px rgba(0,0,0,0.2)"),
        ("box-shadow", "0 0 0 1px rgba(0,0,0,0.25) inset, 0 4px 5px -2px rgba(0,0,0,0.3)"),
    ];

    let mut label_styles: Vec<(&str, &str)> = styles.to_vec();
    for (key, value) in defaults {
        if !label_styles.iter().any(|(k, _)| *k == key) {
            label_styles.push((key, value));
        }
    }

    let html = format!(
        "<div class=\"wdev-marker\" style=\"{}\"><span style=\"{}\">{}</span></div>",
        style_attr(&BLOCK_STYLES),
        style_attr(&label_styles),
        html::escape(&text)
    );

    Marker { html, hash, text, color }
}

fn style_attr(styles: &[(&str, &str)]) -> String {
    html::escape(&styles.iter().map(|(key, value)| format!("{key}:{value};")).collect::<String>())
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_marker_is_stable() {
        let a = marker(Some(&DumpValue::from("checkout")), &[]);
        let b = marker(Some(&DumpValue::from("checkout")), &[]);
        assert_eq!(a, b);
        assert_eq!(a.text, "String: checkout");
        // md5 of the JSON string "\"checkout\""
        assert_eq!(a.hash, md5_hex(b"\"checkout\""));
        assert_eq!(a.color, format!("#{}{}", &a.hash[..3], &a.hash[29..]));
        assert!(a.html.contains(&format!("background:{};", a.color)));
    }

    #[test]
    fn test_composite_marker_uses_hash_label() {
        let value = DumpValue::map([("id", 1)]);
        let m = marker(Some(&value), &[]);
        assert_eq!(m.text, format!("Array: {}", m.hash));
        assert_eq!(m.hash.len(), 32);
    }

    #[test]
    fn test_random_marker() {
        let m = marker(None, &[]);
        assert_eq!(m.text, m.hash);
        assert_eq!(marker(Some(&DumpValue::Null), &[]).text.len(), 32);
    }

    #[test]
    fn test_style_overrides() {
        let m = marker(Some(&DumpValue::Int(5)), &[("background", "red")]);
        assert!(m.html.contains("background:red;"));
        assert_eq!(m.html.matches("background:").count(), 1);
        assert_eq!(m.text, "Integer: 5");
    }
}
