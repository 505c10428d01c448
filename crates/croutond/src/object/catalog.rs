//! The special-operation catalog.
//!
//! Special operations are the fixed set of names a proxy issues for
//! comparisons, container access, arithmetic, attribute access, string
//! conversion and the context-manager protocol. Each entry unpacks the request
//! arguments and calls the matching [`RemoteObject`] hook; any name outside the
//! catalog goes to [`RemoteObject::invoke`].

use std::str::FromStr;

use crouton_protocol::Value;
use strum::{EnumIter, EnumString, IntoStaticStr};

use super::{Arguments, BinaryOp, Comparison, ExecError, Outcome, RemoteObject};

/// Operations with first-class handling, keyed by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
pub enum SpecialOp {
    #[strum(serialize = "__repr__")]
    Repr,
    #[strum(serialize = "__str__")]
    Str,
    #[strum(serialize = "__bytes__")]
    Bytes,
    #[strum(serialize = "__format__")]
    Format,
    #[strum(serialize = "__lt__")]
    Lt,
    #[strum(serialize = "__le__")]
    Le,
    #[strum(serialize = "__eq__")]
    Eq,
    #[strum(serialize = "__ne__")]
    Ne,
    #[strum(serialize = "__gt__")]
    Gt,
    #[strum(serialize = "__ge__")]
    Ge,
    #[strum(serialize = "__hash__")]
    Hash,
    #[strum(serialize = "__bool__")]
    Bool,
    #[strum(serialize = "__getattr__")]
    GetAttr,
    #[strum(serialize = "__setattr__")]
    SetAttr,
    #[strum(serialize = "__delattr__")]
    DelAttr,
    #[strum(serialize = "__dir__")]
    Dir,
    #[strum(serialize = "__call__")]
    Call,
    #[strum(serialize = "__len__")]
    Len,
    #[strum(serialize = "__length_hint__")]
    LengthHint,
    #[strum(serialize = "__getitem__")]
    GetItem,
    #[strum(serialize = "__missing__")]
    Missing,
    #[strum(serialize = "__setitem__")]
    SetItem,
    #[strum(serialize = "__delitem__")]
    DelItem,
    #[strum(serialize = "__iter__")]
    Iter,
    #[strum(serialize = "__next__")]
    Next,
    #[strum(serialize = "__reversed__")]
    Reversed,
    #[strum(serialize = "__contains__")]
    Contains,
    #[strum(serialize = "__enter__")]
    Enter,
    #[strum(serialize = "__exit__")]
    Exit,
    #[strum(serialize = "__add__")]
    Add,
    #[strum(serialize = "__sub__")]
    Sub,
    #[strum(serialize = "__mul__")]
    Mul,
    #[strum(serialize = "__truediv__")]
    TrueDiv,
    #[strum(serialize = "__floordiv__")]
    FloorDiv,
    #[strum(serialize = "__mod__")]
    Mod,
    #[strum(serialize = "__neg__")]
    Neg,
}

impl SpecialOp {
    /// Looks up a method name in the catalog.
    #[must_use]
    pub fn lookup(method: &str) -> Option<Self> {
        Self::from_str(method).ok()
    }

    /// Wire name of the operation.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Applies the operation to `target`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecError`] when the arguments do not fit the operation or
    /// the target's hook fails.
    pub fn apply(
        self,
        target: &mut dyn RemoteObject,
        args: Arguments,
    ) -> Result<Outcome, ExecError> {
        let name = self.name();
        match self {
            Self::Lt => compare(target, Comparison::Lt, name, args),
            Self::Le => compare(target, Comparison::Le, name, args),
            Self::Eq => compare(target, Comparison::Eq, name, args),
            Self::Ne => compare(target, Comparison::Ne, name, args),
            Self::Gt => compare(target, Comparison::Gt, name, args),
            Self::Ge => compare(target, Comparison::Ge, name, args),
            Self::Add => binary(target, BinaryOp::Add, name, args),
            Self::Sub => binary(target, BinaryOp::Sub, name, args),
            Self::Mul => binary(target, BinaryOp::Mul, name, args),
            Self::TrueDiv => binary(target, BinaryOp::TrueDiv, name, args),
            Self::FloorDiv => binary(target, BinaryOp::FloorDiv, name, args),
            Self::Mod => binary(target, BinaryOp::Mod, name, args),
            Self::Repr => {
                args.expect_none(name)?;
                target.repr().map(Outcome::from)
            }
            Self::Str => {
                args.expect_none(name)?;
                target.display().map(Outcome::from)
            }
            Self::Bytes => {
                args.expect_none(name)?;
                target.bytes().map(|bytes| Outcome::Value(Value::Binary(bytes)))
            }
            Self::Format => {
                let spec = if args.args().is_empty() && args.kwargs().is_empty() {
                    String::new()
                } else {
                    let [spec] = args.into_exact(name)?;
                    text_argument(name, spec)?
                };
                target.format(&spec).map(Outcome::from)
            }
            Self::Hash => {
                args.expect_none(name)?;
                target.hash().map(Outcome::from)
            }
            Self::Bool => {
                args.expect_none(name)?;
                target.truthy().map(Outcome::from)
            }
            Self::GetAttr => {
                let [attr] = args.into_exact(name)?;
                target.get_attr(&text_argument(name, attr)?)
            }
            Self::SetAttr => {
                let [attr, value] = args.into_exact(name)?;
                target.set_attr(&text_argument(name, attr)?, value)?;
                Ok(Outcome::none())
            }
            Self::DelAttr => {
                let [attr] = args.into_exact(name)?;
                target.del_attr(&text_argument(name, attr)?)?;
                Ok(Outcome::none())
            }
            Self::Dir => {
                args.expect_none(name)?;
                let names = target.dir()?;
                Ok(Outcome::Value(Value::Array(
                    names.into_iter().map(Value::from).collect(),
                )))
            }
            Self::Call => target.call(args),
            Self::Len => {
                args.expect_none(name)?;
                target.len().map(length_outcome)
            }
            Self::LengthHint => {
                args.expect_none(name)?;
                target.length_hint().map(length_outcome)
            }
            Self::GetItem => {
                let [key] = args.into_exact(name)?;
                match target.get_item(&key) {
                    Err(ExecError::Key(_)) => target.missing(&key),
                    other => other,
                }
            }
            Self::Missing => {
                let [key] = args.into_exact(name)?;
                target.missing(&key)
            }
            Self::SetItem => {
                let [key, value] = args.into_exact(name)?;
                target.set_item(key, value)?;
                Ok(Outcome::none())
            }
            Self::DelItem => {
                let [key] = args.into_exact(name)?;
                target.del_item(&key)?;
                Ok(Outcome::none())
            }
            Self::Iter => {
                args.expect_none(name)?;
                target.iter()
            }
            Self::Next => {
                args.expect_none(name)?;
                target.next()
            }
            Self::Reversed => {
                args.expect_none(name)?;
                target.reversed()
            }
            Self::Contains => {
                let [item] = args.into_exact(name)?;
                target.contains(&item).map(Outcome::from)
            }
            Self::Enter => {
                args.expect_none(name)?;
                target.enter()
            }
            Self::Exit => target.exit(args),
            Self::Neg => {
                args.expect_none(name)?;
                target.negate()
            }
        }
    }
}

/// Routes `method` through the catalog, falling back to generic invocation.
///
/// # Errors
///
/// Propagates the failure of the selected hook or method.
pub fn dispatch(
    target: &mut dyn RemoteObject,
    method: &str,
    args: Arguments,
) -> Result<Outcome, ExecError> {
    match SpecialOp::lookup(method) {
        Some(op) => op.apply(target, args),
        None => target.invoke(method, args),
    }
}

fn compare(
    target: &mut dyn RemoteObject,
    op: Comparison,
    name: &str,
    args: Arguments,
) -> Result<Outcome, ExecError> {
    let [other] = args.into_exact(name)?;
    target.compare(op, &other).map(Outcome::from)
}

fn binary(
    target: &mut dyn RemoteObject,
    op: BinaryOp,
    name: &str,
    args: Arguments,
) -> Result<Outcome, ExecError> {
    let [other] = args.into_exact(name)?;
    target.binary(op, &other)
}

fn text_argument(operation: &str, value: Value) -> Result<String, ExecError> {
    match value {
        Value::String(text) => text.into_str().ok_or_else(|| {
            ExecError::arguments(format!("{operation}() expects valid UTF-8 text"))
        }),
        _ => Err(ExecError::arguments(format!(
            "{operation}() expects a string argument"
        ))),
    }
}

fn length_outcome(len: usize) -> Outcome {
    Outcome::Value(Value::from(u64::try_from(len).unwrap_or(u64::MAX)))
}
