//! Remote types the server registers out of the box.

mod counter;
mod dict;
mod list;
mod record;

pub use counter::Counter;
pub use dict::Dict;
pub use list::{List, ListIterator};
pub use record::Record;

use super::{Factory, factory};

/// Type names and factories of the built-in types.
#[must_use]
pub fn builtin_types() -> Vec<(&'static str, Factory)> {
    vec![
        ("list", factory(List::from_arguments)),
        ("dict", factory(Dict::from_arguments)),
        ("Counter", factory(Counter::from_arguments)),
        ("Record", factory(Record::from_arguments)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_type_names_are_unique() {
        let mut names: Vec<_> = builtin_types().into_iter().map(|(name, _)| name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names, ["Counter", "Record", "dict", "list"]);
    }
}
