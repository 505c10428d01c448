//! A remote integer counter.

use crouton_protocol::Value;

use crate::object::{Arguments, Comparison, ExecError, Outcome, RemoteObject, compare_values};

/// Counter type registered as `Counter`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    value: i64,
}

impl Counter {
    /// Constructs a counter starting at zero, or at the optional `start`
    /// argument (positional or keyword).
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Arguments`] when `start` is not an integer.
    pub fn from_arguments(mut args: Arguments) -> Result<Self, ExecError> {
        let start = match args.take_kwarg("start") {
            Some(start) => {
                args.expect_none("Counter")?;
                Some(start)
            }
            None if args.args().is_empty() && args.kwargs().is_empty() => None,
            None => {
                let [start] = args.into_exact("Counter")?;
                Some(start)
            }
        };
        let value = match start {
            Some(start) => integer_argument("Counter", &start)?,
            None => 0,
        };
        Ok(Self { value })
    }

    /// Current value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.value
    }

    fn step(args: Arguments, operation: &str) -> Result<i64, ExecError> {
        if args.args().is_empty() && args.kwargs().is_empty() {
            return Ok(1);
        }
        let [by] = args.into_exact(operation)?;
        integer_argument(operation, &by)
    }
}

fn integer_argument(operation: &str, value: &Value) -> Result<i64, ExecError> {
    value
        .as_i64()
        .ok_or_else(|| ExecError::arguments(format!("{operation}() expects an integer")))
}

fn overflow() -> ExecError {
    ExecError::invalid_value("counter overflow")
}

impl RemoteObject for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn invoke(&mut self, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
        match method {
            "increment" => {
                let by = Self::step(args, method)?;
                self.value = self.value.checked_add(by).ok_or_else(overflow)?;
                Ok(Outcome::from(self.value))
            }
            "decrement" => {
                let by = Self::step(args, method)?;
                self.value = self.value.checked_sub(by).ok_or_else(overflow)?;
                Ok(Outcome::from(self.value))
            }
            "reset" => {
                args.expect_none(method)?;
                self.value = 0;
                Ok(Outcome::none())
            }
            other => Err(ExecError::no_method(self.type_name(), other)),
        }
    }

    fn repr(&self) -> Result<String, ExecError> {
        Ok(format!("Counter({})", self.value))
    }

    fn display(&self) -> Result<String, ExecError> {
        Ok(self.value.to_string())
    }

    fn compare(&self, op: Comparison, other: &Value) -> Result<bool, ExecError> {
        match compare_values(&Value::from(self.value), other) {
            Some(ordering) => Ok(op.holds(ordering)),
            None => match op {
                Comparison::Eq => Ok(false),
                Comparison::Ne => Ok(true),
                _ => Err(ExecError::unsupported(self.type_name(), "ordering against non-numbers")),
            },
        }
    }

    fn hash(&self) -> Result<i64, ExecError> {
        Ok(self.value)
    }

    fn truthy(&self) -> Result<bool, ExecError> {
        Ok(self.value != 0)
    }

    fn get_attr(&mut self, name: &str) -> Result<Outcome, ExecError> {
        match name {
            "value" => Ok(Outcome::from(self.value)),
            other => Err(ExecError::attribute(self.type_name(), other)),
        }
    }

    fn dir(&self) -> Result<Vec<String>, ExecError> {
        Ok(["decrement", "increment", "reset", "value"]
            .into_iter()
            .map(str::to_owned)
            .collect())
    }
}
