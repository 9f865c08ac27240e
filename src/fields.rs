// Field sets attached to loggers and records

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable mapping from field name to a structured value.
///
/// Cloning is cheap: the map is shared behind an `Arc`. Every enrichment goes
/// through [`merge`] and produces a new set, so a set attached to a logger is
/// never changed after the fact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet(Arc<HashMap<String, Value>>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Only the caller's handle is affected: a set that
    /// is shared with a logger is copied first.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.0).insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries ordered by key, as the encoders write them.
    pub fn sorted(&self) -> Vec<(&str, &Value)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// True when both handles point at the same underlying map.
    pub fn ptr_eq(&self, other: &FieldSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Combine two field sets. Every key of both inputs ends up in the result and
/// `addition` wins on collision. Neither input is touched.
pub fn merge(base: &FieldSet, addition: &FieldSet) -> FieldSet {
    if addition.is_empty() {
        return base.clone();
    }
    if base.is_empty() {
        return addition.clone();
    }

    let mut all = HashMap::with_capacity(base.len() + addition.len());
    for (k, v) in base.0.iter() {
        all.insert(k.clone(), v.clone());
    }
    for (k, v) in addition.0.iter() {
        all.insert(k.clone(), v.clone());
    }
    FieldSet(Arc::new(all))
}

impl From<HashMap<String, Value>> for FieldSet {
    fn from(map: HashMap<String, Value>) -> Self {
        FieldSet(Arc::new(map))
    }
}

impl<K, V> FromIterator<(K, V)> for FieldSet
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FieldSet(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.sorted())
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::<String, Value>::deserialize(deserializer).map(FieldSet::from)
    }
}

/// Build a [`FieldSet`] from `key => value` pairs. Values are any expression
/// `serde_json::json!` accepts, including `{...}` and `[...]` literals.
///
/// ```
/// let ids = vec![1, 2];
/// let fields = structlog_facade::fields! {
///     "user" => 42,
///     "delta" => -1,
///     "count" => ids.len(),
///     "tags" => ["a", "b"],
/// };
/// assert_eq!(fields.len(), 4);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::FieldSet::new()
    };
    ($($rest:tt)+) => {{
        let mut entries: ::std::vec::Vec<(::std::string::String, $crate::__json::Value)> =
            ::std::vec::Vec::new();
        $crate::__field_entries!(entries; $($rest)+);
        entries.into_iter().collect::<$crate::FieldSet>()
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_entries {
    ($entries:ident;) => {};
    ($entries:ident; $key:expr => { $($object:tt)* } $(, $($rest:tt)*)?) => {
        $entries.push((
            ::std::string::String::from($key),
            $crate::__json::json!({ $($object)* }),
        ));
        $crate::__field_entries!($entries; $($($rest)*)?);
    };
    ($entries:ident; $key:expr => [ $($array:tt)* ] $(, $($rest:tt)*)?) => {
        $entries.push((
            ::std::string::String::from($key),
            $crate::__json::json!([ $($array)* ]),
        ));
        $crate::__field_entries!($entries; $($($rest)*)?);
    };
    ($entries:ident; $key:expr => null $(, $($rest:tt)*)?) => {
        $entries.push((::std::string::String::from($key), $crate::__json::Value::Null));
        $crate::__field_entries!($entries; $($($rest)*)?);
    };
    ($entries:ident; $key:expr => $value:expr $(, $($rest:tt)*)?) => {
        $entries.push((::std::string::String::from($key), $crate::__json::json!($value)));
        $crate::__field_entries!($entries; $($($rest)*)?);
    };
}
