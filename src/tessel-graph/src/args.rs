//! Argument trees with embedded graph references.
//!
//! Arguments handed to an operand may nest logical nodes anywhere inside
//! sequences, sets and mappings. [`Arg::visit_tileables`] finds them;
//! [`Arg::resolve`] substitutes each one with a value, leaving everything
//! else untouched.

use std::collections::{BTreeMap, HashSet};

use common_error::TesselResult;
use tessel_core::{TileableKey, Value};

use crate::node::TileableRef;

/// One argument: a plain value, a graph reference, or a container of arguments.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Plain value.
    Value(Value),
    /// Reference to a logical node.
    Tileable(TileableRef),
    /// Ordered sequence.
    List(Vec<Arg>),
    /// Insertion-ordered set.
    Set(Vec<Arg>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Arg>),
}

impl Arg {
    /// Build a list argument.
    pub fn list<I, A>(items: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a mapping argument.
    pub fn map<I, K, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<Arg>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Call `f` on every embedded logical node, depth first, left to right.
    pub fn visit_tileables<F>(&self, f: &mut F)
    where
        F: FnMut(&TileableRef),
    {
        match self {
            Self::Value(_) => {}
            Self::Tileable(t) => f(t),
            Self::List(items) | Self::Set(items) => {
                for item in items {
                    item.visit_tileables(f);
                }
            }
            Self::Map(entries) => {
                for item in entries.values() {
                    item.visit_tileables(f);
                }
            }
        }
    }

    /// Rebuild this argument as a value, substituting every logical node with
    /// `lookup(node)`.
    pub fn resolve<F>(&self, lookup: &mut F) -> TesselResult<Value>
    where
        F: FnMut(&TileableRef) -> TesselResult<Value>,
    {
        Ok(match self {
            Self::Value(v) => v.clone(),
            Self::Tileable(t) => lookup(t)?,
            Self::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| item.resolve(lookup))
                    .collect::<TesselResult<_>>()?,
            ),
            Self::Set(items) => Value::Set(
                items
                    .iter()
                    .map(|item| item.resolve(lookup))
                    .collect::<TesselResult<_>>()?,
            ),
            Self::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, item)| Ok((k.clone(), item.resolve(lookup)?)))
                    .collect::<TesselResult<_>>()?,
            ),
        })
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<TileableRef> for Arg {
    fn from(tileable: TileableRef) -> Self {
        Self::Tileable(tileable)
    }
}

impl From<&TileableRef> for Arg {
    fn from(tileable: &TileableRef) -> Self {
        Self::Tileable(TileableRef::clone(tileable))
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Self::Value(Value::Int64(i))
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Self::Value(Value::Float64(f))
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Arg>> for Arg {
    fn from(entries: BTreeMap<String, Arg>) -> Self {
        Self::Map(entries)
    }
}

/// Logical nodes referenced anywhere in positional and keyword arguments,
/// in first-seen order, each listed once.
pub fn find_tileables(args: &[Arg], kwargs: &BTreeMap<String, Arg>) -> Vec<TileableRef> {
    let mut seen: HashSet<TileableKey> = HashSet::new();
    let mut found = Vec::new();
    let mut record = |t: &TileableRef| {
        if seen.insert(t.key()) {
            found.push(TileableRef::clone(t));
        }
    };
    for arg in args {
        arg.visit_tileables(&mut record);
    }
    for arg in kwargs.values() {
        arg.visit_tileables(&mut record);
    }
    found
}

#[cfg(test)]
mod tests {
    use tessel_core::{ChunkIndex, NodeParams, OutputType, Shape};

    use super::*;
    use crate::ops::DataSource;

    fn object(value: i64) -> TileableRef {
        DataSource::object(Value::from(value))
    }

    #[test]
    fn test_find_nested_tileables() {
        let a = object(1);
        let b = object(2);
        let args = vec![
            Arg::from(7i64),
            Arg::list([Arg::from(&a), Arg::Set(vec![Arg::from(&b), Arg::from(&a)])]),
        ];
        let kwargs: BTreeMap<String, Arg> =
            [("extra".to_string(), Arg::map([("inner", Arg::from(&b))]))].into();

        let found = find_tileables(&args, &kwargs);
        let keys: Vec<_> = found.iter().map(|t| t.key()).collect();
        assert_eq!(keys, vec![a.key(), b.key()]);
    }

    #[test]
    fn test_resolve_substitutes_only_references() {
        let a = object(1);
        let arg = Arg::map([
            ("x", Arg::from(&a)),
            ("y", Arg::list([Arg::from("keep"), Arg::from(&a)])),
        ]);

        let resolved = arg
            .resolve(&mut |t| {
                assert_eq!(t.key(), a.key());
                Ok(Value::from(42))
            })
            .unwrap();

        let expected = Value::Map(
            [
                ("x".to_string(), Value::from(42)),
                (
                    "y".to_string(),
                    Value::List(vec![Value::from("keep"), Value::from(42)]),
                ),
            ]
            .into(),
        );
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_resolve_propagates_lookup_errors() {
        let a = DataSource::from_partitions(
            OutputType::Object,
            NodeParams::with_shape(Shape::scalar()),
            vec![(ChunkIndex::zeros(0), Value::Null)],
            tessel_core::NSplits::default(),
        )
        .unwrap();
        let err = Arg::from(&a)
            .resolve(&mut |_| Err(common_error::TesselError::key_not_found("chunk-0")))
            .unwrap_err();
        assert!(matches!(err, common_error::TesselError::KeyNotFound(_)));
    }
}
