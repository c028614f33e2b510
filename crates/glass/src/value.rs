//! Runtime values and the name-scoping model.
//!
//! A Glass value is one of five kinds. Numbers and names are immediate;
//! strings share their byte storage through `Rc` since values are copied
//! freely between the stack and variables; instances and bound methods carry
//! stable arena indices (see [`crate::heap`]).
//!
//! Scope is a property of a name's spelling and never changes, so it is
//! classified once — at parse time for source names, at generation time for
//! dynamic names — and carried alongside the interned id.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{
    heap::InstanceId,
    intern::{Interns, StringId},
};

/// Which namespace a name resolves in, decided by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum NameScope {
    /// Underscore-initial: lives in the current frame.
    Local,
    /// Lowercase-initial: lives in the current object.
    Field,
    /// Uppercase-initial: lives in the process-wide map.
    Global,
    /// Digit-spelled, produced by `V.n`: stored with the globals but
    /// deletable through `V.d`.
    Dynamic,
}

impl NameScope {
    /// Classifies a name by its first byte.
    ///
    /// The parser guarantees source names start with a letter or underscore;
    /// digit-initial spellings only arise from `V.n`.
    pub fn classify(text: &str) -> Self {
        match text.as_bytes().first() {
            Some(b'_') => Self::Local,
            Some(b) if b.is_ascii_lowercase() => Self::Field,
            Some(b) if b.is_ascii_digit() => Self::Dynamic,
            _ => Self::Global,
        }
    }
}

/// An interned name together with its resolved scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NameRef {
    pub id: StringId,
    pub scope: NameScope,
}

impl NameRef {
    /// Interns `text` and classifies its scope in one step.
    pub fn intern(text: &str, interns: &mut Interns) -> Self {
        Self {
            id: interns.intern(text),
            scope: NameScope::classify(text),
        }
    }
}

/// A method bound to the object it was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoundMethod {
    pub obj: InstanceId,
    pub method: StringId,
}

/// A Glass runtime value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    /// An IEEE-754 double.
    Num(f64),
    /// A byte string. Shared storage; operations build new strings.
    Str(Rc<[u8]>),
    /// A name, distinct from the variable it may denote.
    Name(NameRef),
    /// A handle to an object in the arena.
    Instance(InstanceId),
    /// A method bound to an instance.
    Func(BoundMethod),
}

impl Value {
    /// Loop and conditional truthiness: nonzero numbers and non-empty
    /// strings are true, every other kind is false.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Num(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Name(_) | Self::Instance(_) | Self::Func(_) => false,
        }
    }

    /// The kind's name as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Num(_) => "number",
            Self::Str(_) => "string",
            Self::Name(_) => "name",
            Self::Instance(_) => "instance",
            Self::Func(_) => "function",
        }
    }

    /// The arena id this value keeps alive, if any. Used to seed GC roots.
    pub fn root_id(&self) -> Option<InstanceId> {
        match self {
            Self::Instance(id) => Some(*id),
            Self::Func(method) => Some(method.obj),
            Self::Num(_) | Self::Str(_) | Self::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<NameRef> {
        match self {
            Self::Name(name) => Some(*name),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_classification() {
        assert_eq!(NameScope::classify("_tmp"), NameScope::Local);
        assert_eq!(NameScope::classify("field"), NameScope::Field);
        assert_eq!(NameScope::classify("Global"), NameScope::Global);
        assert_eq!(NameScope::classify("17"), NameScope::Dynamic);
    }

    #[test]
    fn truthiness() {
        let mut interns = Interns::new();
        assert!(Value::Num(2.5).truthy());
        assert!(!Value::Num(0.0).truthy());
        assert!(Value::Str(Rc::from(&b"x"[..])).truthy());
        assert!(!Value::Str(Rc::from(&b""[..])).truthy());
        assert!(!Value::Name(NameRef::intern("x", &mut interns)).truthy());
    }
}
