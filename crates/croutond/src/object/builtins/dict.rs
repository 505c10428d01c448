//! A remote insertion-ordered mapping.

use crouton_protocol::Value;

use super::ListIterator;
use crate::object::{
    Arguments, Comparison, ExecError, Outcome, RemoteObject, render_value, values_equal,
};

/// Mapping type registered as `dict`.
///
/// Keys keep insertion order and are matched with numeric-aware equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    /// Constructs from an optional initial map plus keyword entries.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Arguments`] when the positional argument is not a
    /// map or more than one is given.
    pub fn from_arguments(args: Arguments) -> Result<Self, ExecError> {
        let mut dict = Self::default();
        dict.update(args, "dict")?;
        Ok(dict)
    }

    fn find(&self, key: &Value) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| values_equal(existing, key))
    }

    fn lookup(&self, key: &Value) -> Option<&Value> {
        self.find(key)
            .and_then(|position| self.entries.get(position))
            .map(|(_, value)| value)
    }

    fn insert(&mut self, key: Value, value: Value) {
        match self
            .find(&key)
            .and_then(|position| self.entries.get_mut(position))
        {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    fn remove(&mut self, key: &Value) -> Option<Value> {
        self.find(key)
            .map(|position| self.entries.remove(position))
            .map(|(_, value)| value)
    }

    fn update(&mut self, args: Arguments, operation: &str) -> Result<(), ExecError> {
        let (positional, kwargs) = args.into_parts();
        let mut positional = positional.into_iter();
        if let Some(initial) = positional.next() {
            let Value::Map(entries) = initial else {
                return Err(ExecError::arguments(format!(
                    "{operation}() expects a mapping, got {}",
                    render_value(&initial)
                )));
            };
            for (key, value) in entries {
                self.insert(key, value);
            }
        }
        if positional.next().is_some() {
            return Err(ExecError::arguments(format!(
                "{operation}() takes at most 1 positional argument"
            )));
        }
        for (key, value) in kwargs {
            self.insert(Value::from(key), value);
        }
        Ok(())
    }

    fn snapshot(&self) -> Value {
        Value::Map(self.entries.clone())
    }

    fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

fn key_and_default(args: Arguments, operation: &str) -> Result<(Value, Option<Value>), ExecError> {
    if !args.kwargs().is_empty() {
        return Err(ExecError::arguments(format!(
            "{operation}() takes no keyword arguments"
        )));
    }
    let (positional, _) = args.into_parts();
    let mut positional = positional.into_iter();
    let (Some(key), default, None) = (positional.next(), positional.next(), positional.next())
    else {
        return Err(ExecError::arguments(format!(
            "{operation}() takes 1 or 2 arguments"
        )));
    };
    Ok((key, default))
}

impl RemoteObject for Dict {
    fn type_name(&self) -> &str {
        "dict"
    }

    fn invoke(&mut self, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
        match method {
            "keys" => {
                args.expect_none(method)?;
                Ok(Outcome::Value(Value::Array(self.keys())))
            }
            "values" => {
                args.expect_none(method)?;
                let values = self.entries.iter().map(|(_, value)| value.clone()).collect();
                Ok(Outcome::Value(Value::Array(values)))
            }
            "items" => {
                args.expect_none(method)?;
                let items = self
                    .entries
                    .iter()
                    .map(|(key, value)| Value::Array(vec![key.clone(), value.clone()]))
                    .collect();
                Ok(Outcome::Value(Value::Array(items)))
            }
            "get" => {
                let (key, default) = key_and_default(args, method)?;
                let found = self.lookup(&key).cloned();
                Ok(Outcome::Value(found.or(default).unwrap_or(Value::Nil)))
            }
            "pop" => {
                let (key, default) = key_and_default(args, method)?;
                match (self.remove(&key), default) {
                    (Some(value), _) | (None, Some(value)) => Ok(Outcome::Value(value)),
                    (None, None) => Err(ExecError::key(&key)),
                }
            }
            "setdefault" => {
                let (key, default) = key_and_default(args, method)?;
                if let Some(existing) = self.lookup(&key) {
                    return Ok(Outcome::Value(existing.clone()));
                }
                let value = default.unwrap_or(Value::Nil);
                self.insert(key, value.clone());
                Ok(Outcome::Value(value))
            }
            "update" => {
                self.update(args, method)?;
                Ok(Outcome::none())
            }
            "clear" => {
                args.expect_none(method)?;
                self.entries.clear();
                Ok(Outcome::none())
            }
            "copy" => {
                args.expect_none(method)?;
                Ok(Outcome::object(self.clone()))
            }
            other => Err(ExecError::no_method(self.type_name(), other)),
        }
    }

    fn repr(&self) -> Result<String, ExecError> {
        Ok(render_value(&self.snapshot()))
    }

    fn compare(&self, op: Comparison, other: &Value) -> Result<bool, ExecError> {
        let equal = values_equal(&self.snapshot(), other);
        match op {
            Comparison::Eq => Ok(equal),
            Comparison::Ne => Ok(!equal),
            _ => Err(ExecError::unsupported(self.type_name(), "ordering")),
        }
    }

    fn len(&self) -> Result<usize, ExecError> {
        Ok(self.entries.len())
    }

    fn get_item(&mut self, key: &Value) -> Result<Outcome, ExecError> {
        self.lookup(key)
            .cloned()
            .map(Outcome::Value)
            .ok_or_else(|| ExecError::key(key))
    }

    fn set_item(&mut self, key: Value, value: Value) -> Result<(), ExecError> {
        self.insert(key, value);
        Ok(())
    }

    fn del_item(&mut self, key: &Value) -> Result<(), ExecError> {
        self.remove(key).map(drop).ok_or_else(|| ExecError::key(key))
    }

    fn iter(&mut self) -> Result<Outcome, ExecError> {
        Ok(Outcome::object(ListIterator::new(self.keys())))
    }

    fn reversed(&mut self) -> Result<Outcome, ExecError> {
        let mut keys = self.keys();
        keys.reverse();
        Ok(Outcome::object(ListIterator::new(keys)))
    }

    fn contains(&self, item: &Value) -> Result<bool, ExecError> {
        Ok(self.find(item).is_some())
    }
}
