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

//! HTML helpers
//!
//! Plain-text output is derived from HTML output: tags are removed and entities
//! decoded. Every glyph that only makes sense interactively is drawn by CSS on an
//! empty element, so stripping leaves nothing of it behind.

/// Escape text for use in HTML content and quoted attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// Remove all tags, then decode entities
pub fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    decode_entities(&text)
}

/// Decode named and numeric character references
///
/// `&nbsp;` decodes to a plain space so stripped trees stay easy to copy. Unknown
/// references are kept as they are.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match candidate.find(';').filter(|end| *end <= 10).and_then(|end| {
            decode_reference(&candidate[1..end]).map(|decoded| (decoded, end))
        }) {
            Some((decoded, end)) => {
                out.push(decoded);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">Tom's</a> & co"#),
            "&lt;a href=&quot;x&quot;&gt;Tom&#039;s&lt;/a&gt; &amp; co"
        );
    }

    #[test]
    fn test_strip_and_decode() {
        let html = "<tr class=\"a b\"><td>&nbsp;├─<b>[ id ]</b> =&gt; \
                    &quot;x&quot; &#039;y&#x27;</td></tr>";
        assert_eq!(strip_markup(html), " ├─[ id ] => \"x\" 'y'");
    }

    #[test]
    fn test_escape_then_strip_is_identity() {
        let raw = "if a < b && c > d { \"quoted\" } 'single'";
        assert_eq!(strip_markup(&escape(raw)), raw);
    }

    #[test]
    fn test_unknown_entities_are_kept() {
        assert_eq!(decode_entities("AT&T &bogus; &#zz; &"), "AT&T &bogus; &#zz; &");
    }
}
