//! # Attribute Tables
//!
//! Proxies need to know, for every name an actor exposes, whether it is a
//! method, plain data, or a nested object that can be proxied into. Rust has no
//! runtime attribute lookup, so each proxied object describes itself with a
//! [`Capabilities`] table and answers reflective calls through the
//! [`Traversable`] trait.
//!
//! Only objects implementing [`Traversable`] and listed as
//! [`Attribute::Traversable`] by their parent can be walked into by a nested
//! proxy. Names starting with `_` are never exposed.
//!
//! ```rust
//! use actor_runtime::{ActorError, Args, Capabilities, Traversable};
//! use serde_json::Value;
//!
//! struct Meter { reading: f64 }
//!
//! impl Traversable for Meter {
//!     fn capabilities(&self) -> Capabilities {
//!         Capabilities::new().plain("reading").callable("reset")
//!     }
//!
//!     fn get_attr(&self, name: &str) -> Result<Value, ActorError> {
//!         match name {
//!             "reading" => actor_runtime::attributes::field(&self.reading),
//!             _ => Err(actor_runtime::attributes::not_found(self, name)),
//!         }
//!     }
//!
//!     fn call(&mut self, name: &str, _args: Args) -> Result<Value, ActorError> {
//!         match name {
//!             "reset" => { self.reading = 0.0; Ok(Value::Null) }
//!             _ => Err(actor_runtime::attributes::not_found(self, name)),
//!         }
//!     }
//! }
//! ```

use crate::error::{ActorError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

/// How a proxy treats one exposed name.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// A method; invoking it sends a proxy-call message.
    Callable,
    /// Plain data; reads and writes send get/set messages.
    Plain,
    /// A nested object proxied with an extended attribute path.
    Traversable(Capabilities),
}

/// Capability descriptor table of one object: name to [`Attribute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    entries: BTreeMap<String, Attribute>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callable(self, name: impl Into<String>) -> Self {
        self.with(name, Attribute::Callable)
    }

    pub fn plain(self, name: impl Into<String>) -> Self {
        self.with(name, Attribute::Plain)
    }

    pub fn traversable(self, name: impl Into<String>, nested: Capabilities) -> Self {
        self.with(name, Attribute::Traversable(nested))
    }

    pub fn with(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        let name = name.into();
        if name.starts_with('_') {
            trace!(name, "Skipping private attribute");
            return self;
        }
        self.entries.insert(name, attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Table of the nested object reached by following `path`.
    pub fn at_path(&self, path: &[String]) -> Option<&Capabilities> {
        let mut node = self;
        for name in path {
            match node.entries.get(name) {
                Some(Attribute::Traversable(nested)) => node = nested,
                _ => return None,
            }
        }
        Some(node)
    }
}

/// An object whose attributes can be reached through a proxy.
///
/// Actors opt in by returning themselves from
/// [`Actor::attributes`](crate::Actor::attributes); sub-objects opt in by
/// implementing this trait and being returned from [`traverse`](Self::traverse).
/// All methods run on the owning actor's worker.
pub trait Traversable: Send {
    /// Lists the exposed attributes.
    fn capabilities(&self) -> Capabilities;

    fn get_attr(&self, name: &str) -> Result<Value> {
        Err(not_found(self, name))
    }

    fn set_attr(&mut self, name: &str, _value: Value) -> Result<()> {
        Err(not_found(self, name))
    }

    fn call(&mut self, name: &str, _args: Args) -> Result<Value> {
        Err(not_found(self, name))
    }

    /// Returns the nested traversable object called `name`.
    fn traverse(&mut self, _name: &str) -> Option<&mut dyn Traversable> {
        None
    }
}

/// Follows `path` from `root` through nested traversables.
pub(crate) fn resolve<'a>(
    root: &'a mut dyn Traversable,
    path: &[String],
) -> Result<&'a mut dyn Traversable> {
    let mut node = root;
    for (depth, name) in path.iter().enumerate() {
        node = match node.traverse(name) {
            Some(next) => next,
            None => {
                return Err(ActorError::NotTraversable {
                    target: describe_path(&path[..depth]),
                    name: name.clone(),
                })
            }
        };
    }
    Ok(node)
}

pub(crate) fn describe_path(path: &[String]) -> String {
    if path.is_empty() {
        "actor".to_string()
    } else {
        format!("actor.{}", path.join("."))
    }
}

/// Error for a name `target` does not expose.
pub fn not_found<T: ?Sized>(_target: &T, name: &str) -> ActorError {
    let target = std::any::type_name::<T>()
        .split("::")
        .last()
        .unwrap_or("Unknown");
    ActorError::AttributeNotFound {
        target: target.to_string(),
        name: name.to_string(),
    }
}

/// Encodes a field for [`Traversable::get_attr`].
pub fn field<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Decodes `value` into `slot` for [`Traversable::set_attr`]. The slot is left
/// untouched if decoding fails.
pub fn assign<T: DeserializeOwned>(slot: &mut T, value: Value) -> Result<()> {
    *slot = serde_json::from_value(value)?;
    Ok(())
}

/// Arguments of a proxied method call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Decodes the argument at `index`, falling back to the keyword `name`.
    pub fn param<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T> {
        let value = self
            .positional
            .get(index)
            .or_else(|| self.keyword.get(name))
            .ok_or_else(|| ActorError::invalid(format!("missing argument {name:?}")))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Like [`param`](Self::param) but yields `None` when the argument is absent.
    pub fn optional<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<Option<T>> {
        match self.positional.get(index).or_else(|| self.keyword.get(name)) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

impl<V: Into<Value>> FromIterator<V> for Args {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            positional: iter.into_iter().map(Into::into).collect(),
            keyword: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn private_names_are_not_exposed() {
        let caps = Capabilities::new().plain("count").plain("_secret").callable("bump");
        assert_eq!(caps.names().collect::<Vec<_>>(), vec!["bump", "count"]);
        assert!(caps.get("_secret").is_none());
    }

    #[test]
    fn at_path_walks_traversables_only() {
        let caps = Capabilities::new()
            .traversable("engine", Capabilities::new().plain("rpm"))
            .plain("speed");
        let path = vec!["engine".to_string()];
        assert_eq!(caps.at_path(&path).and_then(|c| c.get("rpm")), Some(&Attribute::Plain));
        assert!(caps.at_path(&["speed".to_string()]).is_none());
    }

    #[test]
    fn args_fall_back_to_keywords() {
        let args = Args::new().arg(3).kwarg("label", "x");
        assert_eq!(args.param::<i32>(0, "by").unwrap(), 3);
        assert_eq!(args.param::<String>(1, "label").unwrap(), "x");
        assert_eq!(args.optional::<bool>(2, "flag").unwrap(), None);
        assert!(matches!(args.param::<i32>(5, "nope"), Err(ActorError::InvalidValue(_))));
        assert!(matches!(args.param::<i32>(1, "label"), Err(ActorError::InvalidValue(_))));
        assert_eq!(Args::from_iter([1, 2]).positional, vec![json!(1), json!(2)]);
    }
}
