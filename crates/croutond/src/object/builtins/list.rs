//! A remote growable sequence of plain values.

use std::cmp::Ordering;

use crouton_protocol::Value;

use crate::object::{
    Arguments, BinaryOp, Comparison, ExecError, Outcome, RemoteObject, compare_values,
    render_value, values_equal,
};

/// Sequence type registered as `list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct List {
    items: Vec<Value>,
}

impl List {
    /// Wraps existing items.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Constructs from request arguments: nothing, or one array to copy.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Arguments`] for any other argument shape.
    pub fn from_arguments(args: Arguments) -> Result<Self, ExecError> {
        if args.args().is_empty() && args.kwargs().is_empty() {
            return Ok(Self::default());
        }
        let [initial] = args.into_exact("list")?;
        Ok(Self::new(array_argument("list", initial)?))
    }

    /// Current items.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    fn position(&self, item: &Value) -> Option<usize> {
        self.items.iter().position(|existing| values_equal(existing, item))
    }
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: &Value, len: usize) -> Result<usize, ExecError> {
    let Some(raw) = index.as_i64() else {
        return Err(ExecError::arguments(format!(
            "indices must be integers, not {}",
            render_value(index)
        )));
    };
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if raw < 0 { raw + signed_len } else { raw };
    usize::try_from(adjusted)
        .ok()
        .filter(|position| *position < len)
        .ok_or(ExecError::Index { index: raw, len })
}

fn array_argument(operation: &str, value: Value) -> Result<Vec<Value>, ExecError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ExecError::arguments(format!(
            "{operation}() expects a sequence, got {}",
            render_value(&other)
        ))),
    }
}

fn length_value(len: usize) -> Value {
    Value::from(u64::try_from(len).unwrap_or(u64::MAX))
}

impl RemoteObject for List {
    fn type_name(&self) -> &str {
        "list"
    }

    fn invoke(&mut self, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
        match method {
            "append" => {
                let [item] = args.into_exact(method)?;
                self.items.push(item);
                Ok(Outcome::none())
            }
            "extend" => {
                let [more] = args.into_exact(method)?;
                self.items.extend(array_argument(method, more)?);
                Ok(Outcome::none())
            }
            "insert" => {
                let [index, item] = args.into_exact(method)?;
                let Some(raw) = index.as_i64() else {
                    return Err(ExecError::arguments("insert() index must be an integer"));
                };
                let len = i64::try_from(self.items.len()).unwrap_or(i64::MAX);
                let clamped = if raw < 0 { (raw + len).max(0) } else { raw.min(len) };
                let position = usize::try_from(clamped).unwrap_or(self.items.len());
                self.items.insert(position, item);
                Ok(Outcome::none())
            }
            "pop" => {
                let index = if args.args().is_empty() && args.kwargs().is_empty() {
                    Value::from(-1)
                } else {
                    let [index] = args.into_exact(method)?;
                    index
                };
                if self.items.is_empty() {
                    return Err(ExecError::invalid_value("pop from empty list"));
                }
                let position = resolve_index(&index, self.items.len())?;
                Ok(Outcome::Value(self.items.remove(position)))
            }
            "remove" => {
                let [item] = args.into_exact(method)?;
                let position = self
                    .position(&item)
                    .ok_or_else(|| ExecError::invalid_value("list.remove(x): x not in list"))?;
                self.items.remove(position);
                Ok(Outcome::none())
            }
            "index" => {
                let [item] = args.into_exact(method)?;
                let position = self.position(&item).ok_or_else(|| {
                    ExecError::invalid_value(format!("{} is not in list", render_value(&item)))
                })?;
                Ok(Outcome::Value(length_value(position)))
            }
            "count" => {
                let [item] = args.into_exact(method)?;
                let count = self
                    .items
                    .iter()
                    .filter(|existing| values_equal(existing, &item))
                    .count();
                Ok(Outcome::Value(length_value(count)))
            }
            "clear" => {
                args.expect_none(method)?;
                self.items.clear();
                Ok(Outcome::none())
            }
            "reverse" => {
                args.expect_none(method)?;
                self.items.reverse();
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
        Ok(render_value(&Value::Array(self.items.clone())))
    }

    fn compare(&self, op: Comparison, other: &Value) -> Result<bool, ExecError> {
        let Value::Array(_) = other else {
            return match op {
                Comparison::Eq => Ok(false),
                Comparison::Ne => Ok(true),
                _ => Err(ExecError::unsupported(self.type_name(), "ordering against non-lists")),
            };
        };
        let mine = Value::Array(self.items.clone());
        let ordering = if values_equal(&mine, other) {
            Some(Ordering::Equal)
        } else {
            compare_values(&mine, other)
        };
        match (op, ordering) {
            (Comparison::Eq, _) => Ok(ordering == Some(Ordering::Equal)),
            (Comparison::Ne, _) => Ok(ordering != Some(Ordering::Equal)),
            (_, Some(ordering)) => Ok(op.holds(ordering)),
            (_, None) => Err(ExecError::unsupported(
                self.type_name(),
                "ordering of incomparable elements",
            )),
        }
    }

    fn len(&self) -> Result<usize, ExecError> {
        Ok(self.items.len())
    }

    fn get_item(&mut self, key: &Value) -> Result<Outcome, ExecError> {
        let position = resolve_index(key, self.items.len())?;
        self.items
            .get(position)
            .cloned()
            .map(Outcome::Value)
            .ok_or(ExecError::Index {
                index: key.as_i64().unwrap_or_default(),
                len: self.items.len(),
            })
    }

    fn set_item(&mut self, key: Value, value: Value) -> Result<(), ExecError> {
        let position = resolve_index(&key, self.items.len())?;
        if let Some(slot) = self.items.get_mut(position) {
            *slot = value;
        }
        Ok(())
    }

    fn del_item(&mut self, key: &Value) -> Result<(), ExecError> {
        let position = resolve_index(key, self.items.len())?;
        self.items.remove(position);
        Ok(())
    }

    fn iter(&mut self) -> Result<Outcome, ExecError> {
        Ok(Outcome::object(ListIterator::new(self.items.clone())))
    }

    fn reversed(&mut self) -> Result<Outcome, ExecError> {
        let mut items = self.items.clone();
        items.reverse();
        Ok(Outcome::object(ListIterator::new(items)))
    }

    fn contains(&self, item: &Value) -> Result<bool, ExecError> {
        Ok(self.position(item).is_some())
    }

    fn binary(&mut self, op: BinaryOp, other: &Value) -> Result<Outcome, ExecError> {
        match (op, other) {
            (BinaryOp::Add, Value::Array(more)) => {
                let mut items = self.items.clone();
                items.extend(more.iter().cloned());
                Ok(Outcome::object(Self::new(items)))
            }
            (BinaryOp::Mul, times) => {
                let Some(times) = times.as_i64() else {
                    return Err(ExecError::arguments("can only multiply a list by an integer"));
                };
                let repeat = usize::try_from(times).unwrap_or(0);
                Ok(Outcome::object(Self::new((0..repeat).flat_map(|_| self.items.iter().cloned()).collect())))
            }
            _ => Err(ExecError::unsupported(self.type_name(), "this arithmetic operand")),
        }
    }
}

/// Iterator over a snapshot of sequence items taken when iteration started.
#[derive(Debug)]
pub struct ListIterator {
    items: std::vec::IntoIter<Value>,
}

impl ListIterator {
    /// Iterates over `items` in order.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl RemoteObject for ListIterator {
    fn type_name(&self) -> &str {
        "list_iterator"
    }

    fn length_hint(&self) -> Result<usize, ExecError> {
        Ok(self.items.len())
    }

    fn truthy(&self) -> Result<bool, ExecError> {
        Ok(true)
    }

    fn iter(&mut self) -> Result<Outcome, ExecError> {
        Ok(Outcome::This)
    }

    fn next(&mut self) -> Result<Outcome, ExecError> {
        self.items
            .next()
            .map(Outcome::Value)
            .ok_or(ExecError::StopIteration)
    }
}
