//! Positional and keyword arguments supplied with a request.

use std::collections::BTreeMap;

use crouton_protocol::Value;

use super::ExecError;

/// Arguments of one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
}

impl Arguments {
    /// Creates arguments from both parts.
    #[must_use]
    pub fn new(args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Creates positional-only arguments.
    #[must_use]
    pub fn positional(args: Vec<Value>) -> Self {
        Self::new(args, BTreeMap::new())
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments.
    #[must_use]
    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Positional argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Removes and returns a keyword argument.
    pub fn take_kwarg(&mut self, name: &str) -> Option<Value> {
        self.kwargs.remove(name)
    }

    /// Checks that no arguments were supplied.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Arguments`] naming `operation` otherwise.
    pub fn expect_none(&self, operation: &str) -> Result<(), ExecError> {
        if self.args.is_empty() && self.kwargs.is_empty() {
            Ok(())
        } else {
            Err(ExecError::arguments(format!(
                "{operation}() takes no arguments"
            )))
        }
    }

    /// Takes exactly `N` positional arguments and no keywords.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Arguments`] when the count differs or keywords were
    /// supplied.
    pub fn into_exact<const N: usize>(self, operation: &str) -> Result<[Value; N], ExecError> {
        if !self.kwargs.is_empty() {
            return Err(ExecError::arguments(format!(
                "{operation}() takes no keyword arguments"
            )));
        }
        let supplied = self.args.len();
        <[Value; N]>::try_from(self.args).map_err(|_| {
            ExecError::arguments(format!(
                "{operation}() takes exactly {N} argument(s) ({supplied} given)"
            ))
        })
    }

    /// Splits into positional and keyword parts.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Value>, BTreeMap<String, Value>) {
        (self.args, self.kwargs)
    }
}
