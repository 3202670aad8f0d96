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

//! Value classification
//!
//! [`classify`] maps a [`DumpValue`] to a closed [`TypeTag`], an optional length
//! and an HTML preview. The renderer switches over the tag; it never probes the
//! value's shape on its own.

use chrono::DateTime;

use crate::{html, DumpValue};

/// Type of a dumped value as shown in the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Text
    String,
    /// Integer
    Integer,
    /// Floating point number
    Float,
    /// Boolean
    Boolean,
    /// Null
    Null,
    /// Integer that looks like a Unix epoch second count
    Timestamp,
    /// Keyed collection
    Collection,
    /// Object with a class name
    Composite,
    /// Invocable value
    Callable,
}

impl TypeTag {
    /// Label shown in dumps
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Null => "NULL",
            Self::Timestamp => "Timestamp",
            Self::Collection => "Array",
            Self::Composite => "Object",
            Self::Callable => "Callable",
        }
    }

    /// CSS class suffix used to colour values of this type
    pub fn css_class(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Timestamp => "timestamp",
            Self::Collection => "array",
            Self::Composite => "object",
            Self::Callable => "callable",
        }
    }

    /// Whether values of this type have children
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Collection | Self::Composite)
    }
}

/// Result of [`classify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Type of the value
    pub tag: TypeTag,
    /// String length, digit count or child count
    pub length: Option<usize>,
    /// Class name of objects
    pub class_name: Option<String>,
    /// Escaped HTML preview of leaf values
    pub preview: Option<String>,
}

impl Classification {
    /// Type label such as `String(5)` or `Object(2) [User]`
    pub fn type_label(&self) -> String {
        let mut label = self.tag.name().to_string();
        if let Some(length) = self.length {
            label.push_str(&format!("({length})"));
        }
        if let Some(class) = &self.class_name {
            label.push_str(&format!(" [{class}]"));
        }
        label
    }
}

/// Classify a value
pub fn classify(value: &DumpValue) -> Classification {
    let leaf = |tag: TypeTag, length: Option<usize>, preview: Option<String>| Classification {
        tag,
        length,
        class_name: None,
        preview,
    };

    match value {
        DumpValue::Callable(name) => leaf(TypeTag::Callable, None, Some(html::escape(name))),
        DumpValue::Str(s) => leaf(
            TypeTag::String,
            Some(s.len()),
            Some(format!("&quot;{}&quot;", html::escape(s))),
        ),
        DumpValue::Int(i) => {
            let digits = i.to_string();
            match is_timestamp(*i).then(|| timestamp_preview(*i)).flatten() {
                Some(utc) => leaf(
                    TypeTag::Timestamp,
                    Some(digits.len()),
                    Some(format!("{digits} <span class=\"dev-timestamp\">[{utc}]</span>")),
                ),
                None => leaf(TypeTag::Integer, Some(digits.len()), Some(digits)),
            }
        }
        DumpValue::Float(f) => {
            let text = f.to_string();
            leaf(TypeTag::Float, Some(text.len()), Some(text))
        }
        DumpValue::Bool(b) => {
            let text = if *b { "TRUE" } else { "FALSE" };
            leaf(TypeTag::Boolean, Some(usize::from(*b)), Some(text.to_string()))
        }
        DumpValue::Null => leaf(TypeTag::Null, Some(0), None),
        DumpValue::Collection(fields) => leaf(TypeTag::Collection, Some(fields.len()), None),
        DumpValue::Object(object) => Classification {
            tag: TypeTag::Composite,
            length: Some(object.len()),
            class_name: Some(object.class_name()),
            preview: None,
        },
    }
}

/// Whether an integer has exactly 10 decimal digits and starts with `1`
pub fn is_timestamp(value: i64) -> bool {
    let digits = value.to_string();
    digits.len() == 10 && digits.starts_with('1')
}

/// UTC calendar form of a Unix epoch second count
pub fn timestamp_preview(seconds: i64) -> Option<String> {
    DateTime::from_timestamp(seconds, 0).map(|utc| utc.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
