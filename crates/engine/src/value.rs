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

//! Describable values
//!
//! Everything that can be dumped is first turned into a [`DumpValue`]. The model is
//! closed: scalars, callables, ordered collections and objects. Objects are shared
//! handles and are the only values with identity, so they are the only values that
//! can form cycles.
//!
//! Field visibility is carried explicitly on every [`Field`]. Hosts bridging from a
//! reflective runtime tag protected and private members when they build the value.

use std::{
    cell::{Ref, RefCell},
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    rc::Rc,
};

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Visibility of an object field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible to everyone
    #[default]
    Public,
    /// Visible to the class and its descendants
    Protected,
    /// Visible to the class only
    Private,
}

/// Key of a collection entry or object field
///
/// Indices sort before names; indices compare numerically and names byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Positional or integer key
    Index(i64),
    /// Named key
    Name(String),
}

impl Ord for FieldKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Index(a), Self::Index(b)) => a.cmp(b),
            (Self::Index(_), Self::Name(_)) => Ordering::Less,
            (Self::Name(_), Self::Index(_)) => Ordering::Greater,
            (Self::Name(a), Self::Name(b)) => a.as_bytes().cmp(b.as_bytes()),
        }
    }
}

impl PartialOrd for FieldKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for FieldKey {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<i64> for FieldKey {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<i32> for FieldKey {
    fn from(index: i32) -> Self {
        Self::Index(index.into())
    }
}

impl From<usize> for FieldKey {
    fn from(index: usize) -> Self {
        i64::try_from(index).map(Self::Index).unwrap_or_else(|_| Self::Name(index.to_string()))
    }
}

/// One entry of a collection or object
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Entry key
    pub key: FieldKey,
    /// Visibility of the entry, always public for collections
    pub visibility: Visibility,
    /// Entry value
    pub value: DumpValue,
}

impl Field {
    /// A public field
    pub fn new(key: impl Into<FieldKey>, value: impl Into<DumpValue>) -> Self {
        Self { key: key.into(), visibility: Visibility::Public, value: value.into() }
    }

    /// A protected field
    pub fn protected(key: impl Into<FieldKey>, value: impl Into<DumpValue>) -> Self {
        Self { visibility: Visibility::Protected, ..Self::new(key, value) }
    }

    /// A private field
    pub fn private(key: impl Into<FieldKey>, value: impl Into<DumpValue>) -> Self {
        Self { visibility: Visibility::Private, ..Self::new(key, value) }
    }
}

/// Class name and fields of an object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    /// Class name shown next to the type label
    pub class: String,
    /// Fields in declaration order
    pub fields: Vec<Field>,
}

/// Shared handle to an [`Object`]
///
/// Cloning the handle shares the object. Two handles are the same object iff they
/// point to the same allocation, which is what cycle detection relies on.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// Create an object without fields
    pub fn new(class: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(Object { class: class.into(), fields: Vec::new() })))
    }

    /// Add or replace a public field, builder style
    pub fn with_field(self, key: impl Into<FieldKey>, value: impl Into<DumpValue>) -> Self {
        self.set_field(Field::new(key, value));
        self
    }

    /// Add or replace a public field
    pub fn set(&self, key: impl Into<FieldKey>, value: impl Into<DumpValue>) {
        self.set_field(Field::new(key, value));
    }

    /// Add a field, replacing an existing field with the same key
    pub fn set_field(&self, field: Field) {
        let mut object = self.0.borrow_mut();
        match object.fields.iter_mut().find(|existing| existing.key == field.key) {
            Some(existing) => *existing = field,
            None => object.fields.push(field),
        }
    }

    /// Borrow the object
    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Class name of the object
    pub fn class_name(&self) -> String {
        self.0.borrow().class.clone()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.borrow().fields.len()
    }

    /// Whether the object has no fields
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the shared allocation, stable for the object's lifetime
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Whether both handles refer to the same object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Objects may be cyclic, so Debug never descends into fields.
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "ObjectRef({}@{:#x})", object.class, self.identity()),
            Err(_) => write!(f, "ObjectRef(<borrowed>@{:#x})", self.identity()),
        }
    }
}

/// A value that can be dumped
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DumpValue {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Str(String),
    /// Something invocable, shown by name
    Callable(String),
    /// Ordered key/value collection
    Collection(Vec<Field>),
    /// Shared object with identity
    Object(ObjectRef),
}

impl DumpValue {
    /// A collection keyed by position
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::Collection(items.into_iter().enumerate().map(|(i, v)| Field::new(i, v)).collect())
    }

    /// A collection from key/value pairs, in iteration order
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<FieldKey>,
        V: Into<Self>,
    {
        Self::Collection(entries.into_iter().map(|(k, v)| Field::new(k, v)).collect())
    }

    /// A callable shown by name
    pub fn callable(name: impl Into<String>) -> Self {
        Self::Callable(name.into())
    }

    /// Convert any serializable host value through its JSON form
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }

    /// Whether the value is a string, number or boolean
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_))
    }

    /// Whether the value has children
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Collection(_) | Self::Object(_))
    }

    /// Truthiness: null, false, zero, `""`, `"0"` and empty collections are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty() && s != "0",
            Self::Collection(fields) => !fields.is_empty(),
            Self::Callable(_) | Self::Object(_) => true,
        }
    }

    /// Text of a scalar value, `None` for everything else
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Name of the value's runtime type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "Boolean",
            Self::Int(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Str(_) => "String",
            Self::Callable(_) => "Callable",
            Self::Collection(_) => "Array",
            Self::Object(_) => "Object",
        }
    }

    /// JSON form of the value
    ///
    /// Objects become JSON objects of their fields; an object met again on its own
    /// path becomes the string `*RECURSION*`.
    pub fn to_json(&self) -> Value {
        self.to_json_guarded(&mut HashSet::new())
    }

    fn to_json_guarded(&self, path: &mut HashSet<usize>) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Self::Str(s) | Self::Callable(s) => Value::String(s.clone()),
            Self::Collection(fields) => {
                let is_list = fields
                    .iter()
                    .enumerate()
                    .all(|(i, f)| matches!(f.key, FieldKey::Index(k) if k == i as i64));
                if is_list {
                    Value::Array(fields.iter().map(|f| f.value.to_json_guarded(path)).collect())
                } else {
                    fields_to_json(fields, path)
                }
            }
            Self::Object(object) => {
                let identity = object.identity();
                if !path.insert(identity) {
                    return Value::String("*RECURSION*".to_string());
                }
                let json = fields_to_json(&object.borrow().fields, path);
                path.remove(&identity);
                json
            }
        }
    }
}

fn fields_to_json(fields: &[Field], path: &mut HashSet<usize>) -> Value {
    let map: Map<String, Value> =
        fields.iter().map(|f| (f.key.to_string(), f.value.to_json_guarded(path))).collect();
    Value::Object(map)
}

/// Host types that know how to describe themselves for a dump
pub trait Dumpable {
    /// Describe the value
    fn to_dump_value(&self) -> DumpValue;
}

impl<T> Dumpable for T
where
    T: Clone + Into<DumpValue>,
{
    fn to_dump_value(&self) -> DumpValue {
        self.clone().into()
    }
}

impl From<()> for DumpValue {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for DumpValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! from_lossless_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for DumpValue {
            fn from(i: $ty) -> Self {
                Self::Int(i.into())
            }
        })*
    };
}

from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for DumpValue {
    fn from(i: u64) -> Self {
        i64::try_from(i).map(Self::Int).unwrap_or(Self::Float(i as f64))
    }
}

impl From<usize> for DumpValue {
    fn from(i: usize) -> Self {
        i64::try_from(i).map(Self::Int).unwrap_or(Self::Float(i as f64))
    }
}

impl From<f32> for DumpValue {
    fn from(f: f32) -> Self {
        Self::Float(f.into())
    }
}

impl From<f64> for DumpValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for DumpValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for DumpValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&String> for DumpValue {
    fn from(s: &String) -> Self {
        Self::Str(s.clone())
    }
}

impl From<ObjectRef> for DumpValue {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

impl<T: Into<Self>> From<Option<T>> for DumpValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for DumpValue {
    fn from(items: Vec<T>) -> Self {
        Self::list(items)
    }
}

impl<K: Into<FieldKey>, V: Into<Self>> From<BTreeMap<K, V>> for DumpValue {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::map(map)
    }
}

impl<K: Into<FieldKey>, V: Into<Self>> From<HashMap<K, V>> for DumpValue {
    fn from(map: HashMap<K, V>) -> Self {
        Self::map(map)
    }
}

impl From<Value> for DumpValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(f)) => Self::Float(f),
                (None, None) => Self::Str(n.to_string()),
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::list(items),
            Value::Object(map) => Self::map(map),
        }
    }
}

impl From<&Value> for DumpValue {
    fn from(value: &Value) -> Self {
        value.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            FieldKey::from("b"),
            FieldKey::from(10i64),
            FieldKey::from("B"),
            FieldKey::from(2i64),
            FieldKey::from("a"),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["2", "10", "B", "a", "b"]);
    }

    #[test]
    fn test_set_replaces_existing_field() {
        let object = ObjectRef::new("User").with_field("id", 1).with_field("name", "x");
        object.set("id", 2);
        let fields = &object.borrow().fields;
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].value, DumpValue::Int(2));
    }

    #[test]
    fn test_object_identity() {
        let a = ObjectRef::new("Node");
        let b = a.clone();
        let c = ObjectRef::new("Node");
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a, c);
    }

    #[test]
    fn test_debug_of_cyclic_object_terminates() {
        let node = ObjectRef::new("Node");
        node.set("me", node.clone());
        let debug = format!("{:?}", DumpValue::from(node));
        assert!(debug.contains("ObjectRef(Node@"));
    }

    #[test]
    fn test_from_json() {
        let value = DumpValue::from(json!({"a": [1, 2.5, null], "b": true}));
        let DumpValue::Collection(fields) = value else { panic!("expected a collection") };
        assert_eq!(fields[0].key, FieldKey::from("a"));
        assert_eq!(
            fields[0].value,
            DumpValue::list(vec![DumpValue::Int(1), DumpValue::Float(2.5), DumpValue::Null])
        );
        assert_eq!(fields[1].value, DumpValue::Bool(true));
    }

    #[test]
    fn test_to_json_cuts_cycles() {
        let node = ObjectRef::new("Node").with_field("id", 7);
        node.set("me", node.clone());
        let json = DumpValue::from(node).to_json();
        assert_eq!(json, json!({"id": 7, "me": "*RECURSION*"}));

        let list = DumpValue::list(vec!["a", "b"]);
        assert_eq!(list.to_json(), json!(["a", "b"]));
    }

    #[test]
    fn test_truthiness_and_scalars() {
        assert!(!DumpValue::from("0").is_truthy());
        assert!(!DumpValue::from("").is_truthy());
        assert!(DumpValue::from("debug").is_truthy());
        assert!(!DumpValue::Collection(vec![]).is_truthy());
        assert_eq!(DumpValue::from(2.0).scalar_text().as_deref(), Some("2"));
        assert_eq!(DumpValue::Null.scalar_text(), None);
    }

    #[test]
    fn test_dumpable_blanket_and_serialize() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }
        let value = DumpValue::from_serialize(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(value, DumpValue::map([("x", 1), ("y", 2)]));
        assert_eq!(42u8.to_dump_value(), DumpValue::Int(42));
    }
}
