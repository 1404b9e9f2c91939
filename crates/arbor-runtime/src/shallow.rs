#![forbid(unsafe_code)]

//! Derived component state and one-level value comparison.
//!
//! A component's derived state is a [`DerivedState`]: an ordered set of named
//! [`Field`]s. Two derived states are compared field by field. A field whose
//! value carries its own equality ([`Field::Custom`]) decides for itself;
//! plain values compare structurally; absent fields only equal absent fields.
//! Nothing below the first level is inspected by the comparison itself.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// Custom equality capability for field values.
///
/// Implement this for value types that know how to compare themselves more
/// cheaply or more loosely than structural equality (persistent collections,
/// versioned records, handles).
///
/// ```
/// use std::any::Any;
/// use arbor_runtime::shallow::{Equals, Field};
///
/// #[derive(Debug)]
/// struct Doc { id: u32, rev: u32 }
///
/// impl Equals for Doc {
///     fn equals(&self, other: &Field) -> bool {
///         other.downcast_ref::<Doc>().is_some_and(|o| o.id == self.id && o.rev == self.rev)
///     }
///     fn as_any(&self) -> &dyn Any { self }
/// }
///
/// let a = Field::custom(Doc { id: 1, rev: 4 });
/// assert!(a.equals(&Field::custom(Doc { id: 1, rev: 4 })));
/// assert!(!a.equals(&Field::custom(Doc { id: 1, rev: 5 })));
/// ```
pub trait Equals: fmt::Debug + 'static {
    /// Whether `self` equals `other`.
    fn equals(&self, other: &Field) -> bool;

    /// `self` as `Any`, for downcasting the other side of a comparison.
    fn as_any(&self) -> &dyn Any;
}

/// One named value of a [`DerivedState`].
#[derive(Clone, Debug, Default)]
pub enum Field {
    /// Nothing was found (e.g. a read of an unwritten path).
    #[default]
    Absent,
    /// A plain tree value, compared structurally.
    Value(Value),
    /// A value with its own equality.
    Custom(Rc<dyn Equals>),
}

impl Field {
    /// Wrap a value that provides its own equality.
    pub fn custom(value: impl Equals) -> Self {
        Self::Custom(Rc::new(value))
    }

    /// Whether this field is [`Field::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The plain value, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The plain value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// The custom value downcast to `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Custom(custom) => custom.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Compare with `other`, preferring this field's custom equality.
    #[must_use]
    pub fn equals(&self, other: &Field) -> bool {
        match self {
            Self::Custom(custom) => custom.equals(other),
            Self::Value(value) => matches!(other, Self::Value(o) if o == value),
            Self::Absent => other.is_absent(),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for Field {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Absent, Self::Value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Self::Value(Value::from(value))
    }
}

/// How two derived states are matched up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CompareMode {
    /// Both states must have the same field names and every field must be
    /// equal.
    #[default]
    Symmetric,
    /// Only the previous state's fields are checked; fields that appear only
    /// in the next state are ignored.
    LeftKeys,
}

/// State a component derives from the tree.
///
/// Field order is insertion order; inserting an existing name replaces its
/// value in place.
#[derive(Clone, Debug, Default)]
pub struct DerivedState {
    fields: Vec<(String, Field)>,
}

impl DerivedState {
    /// An empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.insert(name, field);
        self
    }

    /// Set a field, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        let name = name.into();
        let field = field.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = field,
            None => self.fields.push((name, field)),
        }
    }

    /// The field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// The plain value of the field called `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Field::as_value)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// One-level comparison against `next`.
    #[must_use]
    pub fn shallow_eq(&self, next: &DerivedState, mode: CompareMode) -> bool {
        shallow_equal(self, next, mode)
    }
}

/// Compare `prev` and `next` field by field.
///
/// Each of `prev`'s fields is compared with [`Field::equals`] against the
/// field of the same name in `next` (absent if missing). In
/// [`CompareMode::Symmetric`] a field present only in `next` also makes the
/// states differ, unless it is itself absent.
#[must_use]
pub fn shallow_equal(prev: &DerivedState, next: &DerivedState, mode: CompareMode) -> bool {
    let absent = Field::Absent;
    let left = prev
        .iter()
        .all(|(name, field)| field.equals(next.get(name).unwrap_or(&absent)));
    match mode {
        CompareMode::LeftKeys => left,
        CompareMode::Symmetric => {
            left && next
                .iter()
                .all(|(name, field)| prev.get(name).is_some() || field.is_absent())
        }
    }
}

#[cfg(feature = "hamt")]
mod persistent {
    use super::{Equals, Field};
    use std::any::Any;
    use std::fmt::Debug;

    impl<A: Clone + PartialEq + Debug + 'static> Equals for im::Vector<A> {
        fn equals(&self, other: &Field) -> bool {
            other
                .downcast_ref::<Self>()
                .is_some_and(|o| self.ptr_eq(o) || self == o)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl<K, V> Equals for im::OrdMap<K, V>
    where
        K: Ord + Clone + Debug + 'static,
        V: Clone + PartialEq + Debug + 'static,
    {
        fn equals(&self, other: &Field) -> bool {
            other
                .downcast_ref::<Self>()
                .is_some_and(|o| self.ptr_eq(o) || self == o)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }
}
