//! A remote attribute bag that can hold nested records.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crouton_protocol::Value;

use crate::object::{Arguments, ExecError, Outcome, RemoteObject, SharedObject, render_value, share};

enum Slot {
    Plain(Value),
    Nested(SharedObject),
}

/// Attribute bag registered as `Record`.
///
/// Keyword arguments become attributes; positional arguments are stored as
/// `arg1`, `arg2` and so on. Nested records are returned by reference.
#[derive(Default)]
pub struct Record {
    attributes: BTreeMap<String, Slot>,
}

impl Record {
    /// Constructs a record from request arguments.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the factory contract.
    pub fn from_arguments(args: Arguments) -> Result<Self, ExecError> {
        let (positional, kwargs) = args.into_parts();
        let mut attributes: BTreeMap<String, Slot> = positional
            .into_iter()
            .enumerate()
            .map(|(position, value)| (format!("arg{}", position + 1), Slot::Plain(value)))
            .collect();
        for (name, value) in kwargs {
            attributes.insert(name, Slot::Plain(value));
        }
        Ok(Self { attributes })
    }

    fn nest(&mut self, name: String) -> Result<Outcome, ExecError> {
        if let Some(Slot::Nested(existing)) = self.attributes.get(&name) {
            return Ok(Outcome::Object(SharedObject::clone(existing)));
        }
        let nested = share(Self::default());
        self.attributes
            .insert(name, Slot::Nested(SharedObject::clone(&nested)));
        Ok(Outcome::Object(nested))
    }
}

impl RemoteObject for Record {
    fn type_name(&self) -> &str {
        "Record"
    }

    fn invoke(&mut self, method: &str, args: Arguments) -> Result<Outcome, ExecError> {
        match method {
            "nest" => {
                let [name] = args.into_exact(method)?;
                match name {
                    Value::String(name) => match name.into_str() {
                        Some(name) => self.nest(name),
                        None => Err(ExecError::arguments("nest() expects valid UTF-8 text")),
                    },
                    _ => Err(ExecError::arguments("nest() expects a string argument")),
                }
            }
            other => Err(ExecError::no_method(self.type_name(), other)),
        }
    }

    fn repr(&self) -> Result<String, ExecError> {
        let mut out = String::from("Record(");
        for (position, (name, slot)) in self.attributes.iter().enumerate() {
            if position > 0 {
                out.push_str(", ");
            }
            match slot {
                Slot::Plain(value) => {
                    let _ = write!(out, "{name}={}", render_value(value));
                }
                Slot::Nested(_) => {
                    let _ = write!(out, "{name}=Record(...)");
                }
            }
        }
        out.push(')');
        Ok(out)
    }

    fn truthy(&self) -> Result<bool, ExecError> {
        Ok(true)
    }

    fn get_attr(&mut self, name: &str) -> Result<Outcome, ExecError> {
        match self.attributes.get(name) {
            Some(Slot::Plain(value)) => Ok(Outcome::Value(value.clone())),
            Some(Slot::Nested(nested)) => Ok(Outcome::Object(SharedObject::clone(nested))),
            None => Err(ExecError::attribute(self.type_name(), name)),
        }
    }

    fn set_attr(&mut self, name: &str, value: Value) -> Result<(), ExecError> {
        self.attributes.insert(name.to_owned(), Slot::Plain(value));
        Ok(())
    }

    fn del_attr(&mut self, name: &str) -> Result<(), ExecError> {
        self.attributes
            .remove(name)
            .map(drop)
            .ok_or_else(|| ExecError::attribute(self.type_name(), name))
    }

    fn dir(&self) -> Result<Vec<String>, ExecError> {
        Ok(self.attributes.keys().cloned().collect())
    }

    fn enter(&mut self) -> Result<Outcome, ExecError> {
        Ok(Outcome::This)
    }

    fn exit(&mut self, _args: Arguments) -> Result<Outcome, ExecError> {
        Ok(Outcome::from(false))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn sample() -> Record {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("kwarg1".to_owned(), Value::from("a keyword arg"));
        Record::from_arguments(Arguments::new(vec![Value::from("first arg")], kwargs))
            .expect("construct")
    }

    #[test]
    fn arguments_become_attributes() {
        let mut record = sample();
        assert_eq!(record.dir().expect("dir"), ["arg1", "kwarg1"]);
        assert!(matches!(
            record.get_attr("arg1"),
            Ok(Outcome::Value(value)) if value == Value::from("first arg")
        ));
        assert_eq!(
            record.repr().expect("repr"),
            "Record(arg1='first arg', kwarg1='a keyword arg')"
        );
    }

    #[test]
    fn nested_records_are_shared_by_reference() {
        let mut record = sample();
        let Ok(Outcome::Object(first)) =
            record.invoke("nest", Arguments::positional(vec![Value::from("child")]))
        else {
            panic!("nest returns an object");
        };
        let Ok(Outcome::Object(second)) = record.get_attr("child") else {
            panic!("nested attribute is an object");
        };
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn attributes_can_be_replaced_and_deleted() {
        let mut record = sample();
        record.set_attr("arg1", Value::from(2)).expect("set");
        record.del_attr("kwarg1").expect("delete");
        assert!(record.del_attr("kwarg1").is_err());
        assert_eq!(record.dir().expect("dir"), ["arg1"]);
    }

    #[test]
    fn context_manager_returns_itself_and_does_not_suppress() {
        let mut record = sample();
        assert!(matches!(record.enter(), Ok(Outcome::This)));
        assert!(matches!(
            record.exit(Arguments::positional(vec![Value::Nil, Value::Nil, Value::Nil])),
            Ok(Outcome::Value(Value::Boolean(false)))
        ));
    }
}
