//! Error types for parsing, linking, and execution.
//!
//! Internally every failure carries a compact [`SourceLoc`] (interned file id
//! plus line and column). At the public API boundary those are resolved into
//! an [`Error`] whose [`SourcePos`] holds the actual file name, so callers
//! can display diagnostics without access to the interner. No error is ever
//! recovered: the first failure aborts the parse or the run.

use std::{fmt, io, path::PathBuf};

use crate::{builtins::Builtin, code::SourceLoc, intern::Interns};

/// A fully resolved source position: file name, 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePos {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

impl SourceLoc {
    /// Resolves the interned file id into a displayable position.
    pub(crate) fn resolve(self, interns: &Interns) -> SourcePos {
        SourcePos {
            file: interns.file_name(self.file).to_owned(),
            line: self.line,
            col: self.col,
        }
    }
}

/// Everything that can make a parse fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A character that can never appear inside a name.
    InvalidNameChar(char),
    /// A name starting with a character other than a letter or underscore.
    InvalidNameStart(char),
    /// A name starting with a decimal digit. Digit-initial spellings are
    /// reserved for runtime-generated dynamic names.
    DigitNameStart(char),
    /// A parenthesized name with nothing between the parentheses.
    EmptyName,
    /// A comment's opening apostrophe was never matched.
    UnterminatedComment,
    /// A string literal's opening quote was never matched.
    UnterminatedString,
    /// End of file inside a `<...>` or `(...)` number literal.
    UnterminatedNumber,
    /// End of file inside a parenthesized name.
    UnterminatedName,
    /// A number literal that does not match
    /// `[+-]?digits(.digits)?([eE][+-]?digits)?`, or one too large for a
    /// finite double.
    InvalidNumber(String),
    /// A `/` loop still open when its method ended.
    UnclosedLoop,
    /// A `\` with no `/` loop open.
    StrayLoopEnd,
    /// A class (or parent) name that does not begin with an uppercase letter.
    ClassNameCase(String),
    /// A method name that does not begin with a lowercase letter.
    MethodNameCase(String),
    /// The same method defined twice within one class.
    DuplicateMethod { class: String, method: String },
    /// The same class defined twice, possibly across included files.
    DuplicateClass(String),
    /// The same parent listed twice in one inheritance header.
    DuplicateParent { class: String, parent: String },
    /// A character that does not start any production at this position.
    UnexpectedChar(char),
    /// End of file in the middle of a class or method body.
    UnexpectedEof,
    /// An inheritance header while `--pedantic` is active.
    PedanticParent { class: String },
    /// A top-level include string while `--pedantic` is active.
    PedanticInclude,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNameChar(c) => write!(f, "unexpected {c:?} in a name"),
            Self::InvalidNameStart(c) => write!(f, "{c:?} may not start a name"),
            Self::DigitNameStart(c) => write!(f, "a name may not start with the digit {c:?}"),
            Self::EmptyName => write!(f, "names may not be empty"),
            Self::UnterminatedComment => write!(f, "unterminated comment"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::UnterminatedNumber => write!(f, "end of file reached while reading a number"),
            Self::UnterminatedName => write!(f, "end of file reached while reading a name"),
            Self::InvalidNumber(text) => write!(f, "{text:?} is not a number"),
            Self::UnclosedLoop => write!(f, "loop is never closed"),
            Self::StrayLoopEnd => write!(f, "\"\\\" without a matching \"/\""),
            Self::ClassNameCase(name) => {
                write!(f, "class name {name:?} must begin with an uppercase letter")
            }
            Self::MethodNameCase(name) => {
                write!(f, "method name {name:?} must begin with a lowercase letter")
            }
            Self::DuplicateMethod { class, method } => {
                write!(f, "class {class:?} defines {method:?} more than once")
            }
            Self::DuplicateClass(name) => write!(f, "class {name:?} is defined more than once"),
            Self::DuplicateParent { class, parent } => {
                write!(f, "class {class:?} inherits from {parent:?} more than once")
            }
            Self::UnexpectedChar(c) => write!(f, "unexpected {c:?}"),
            Self::UnexpectedEof => write!(f, "unexpected end of file"),
            Self::PedanticParent { class } => write!(
                f,
                "class {class:?} uses inheritance, which is a non-standard extension"
            ),
            Self::PedanticInclude => {
                write!(f, "include strings are a non-standard extension")
            }
        }
    }
}

/// Failures detected while validating and resolving inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkErrorKind {
    /// A class names a parent that was never defined.
    UndefinedParent { class: String, parent: String },
    /// The parent graph contains a cycle through this class.
    InheritanceCycle { class: String },
}

impl fmt::Display for LinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedParent { class, parent } => {
                write!(f, "class {class:?} inherits from undefined class {parent:?}")
            }
            Self::InheritanceCycle { class } => {
                write!(f, "inheritance cycle detected at class {class:?}")
            }
        }
    }
}

/// Everything that can abort execution.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    /// A pop from an empty operand stack.
    EmptyStack,
    /// A read of a name with no binding in its scope.
    Undefined(String),
    /// An assignment whose target is not a name value.
    AssignToNonName,
    /// An instantiation whose class operand is not a name value.
    InstantiateNonName,
    /// An instantiation of a name that is not a class.
    UnknownClass(String),
    /// A value retrieval from a non-name.
    ValueOfNonName,
    /// A method retrieval whose operands are not names.
    FunctionOfNonName,
    /// A method retrieval from a value that is not an instance.
    FunctionFromNonInstance,
    /// A method lookup that found nothing on the instance's class.
    UnknownMethod { object: String, method: String },
    /// An execution of a value that is not a function.
    ExecuteNonFunction,
    /// A duplication index at or beyond the stack depth.
    DupOutOfRange { index: usize },
    /// A builtin applied to operands of the wrong kind.
    BuiltinType(Builtin),
    /// `S.si` with an index outside the string.
    StringIndexOutOfRange { index: i64, len: usize },
    /// `S.si` with a replacement that is not exactly one byte.
    ReplacementNotOneByte { len: usize },
    /// `S.sn` applied to the empty string.
    EmptyStringToNumber,
    /// `V.d` applied to a non-name value.
    DeleteNonName,
    /// `V.d` applied to a name that was not produced by `V.n`.
    DeleteNonGenerated(String),
    /// A read from standard input failed at the OS level.
    Input(String),
    /// A write to standard output failed at the OS level.
    Output(String),
    /// The frame stack reached the fixed depth cap.
    CallDepthExceeded,
    /// The program defines no class `M`.
    MissingMainClass,
    /// Class `M` defines no method `m`.
    MissingMainMethod,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyStack => write!(f, "attempted to pop an empty stack"),
            Self::Undefined(name) => write!(f, "{name:?} is not defined"),
            Self::AssignToNonName => write!(f, "cannot assign to a non-name"),
            Self::InstantiateNonName => write!(f, "cannot instantiate a non-name"),
            Self::UnknownClass(name) => write!(f, "cannot instantiate unknown class {name:?}"),
            Self::ValueOfNonName => write!(f, "cannot retrieve the value of a non-name"),
            Self::FunctionOfNonName => write!(f, "cannot retrieve a method of a non-name"),
            Self::FunctionFromNonInstance => {
                write!(f, "cannot retrieve a method from a non-instance")
            }
            Self::UnknownMethod { object, method } => {
                write!(f, "{object:?} has no method {method:?}")
            }
            Self::ExecuteNonFunction => write!(f, "cannot execute a non-function"),
            Self::DupOutOfRange { index } => {
                write!(f, "cannot duplicate stack element {index}: out of range")
            }
            Self::BuiltinType(builtin) => f.write_str(builtin.type_error_message()),
            Self::StringIndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for a string of {len} bytes")
            }
            Self::ReplacementNotOneByte { len } => {
                write!(f, "replacement must be exactly one byte, not {len}")
            }
            Self::EmptyStringToNumber => {
                write!(f, "cannot take the byte value of an empty string")
            }
            Self::DeleteNonName => write!(f, "cannot delete a non-name"),
            Self::DeleteNonGenerated(name) => {
                write!(f, "cannot delete {name:?}: not a generated name")
            }
            Self::Input(cause) => write!(f, "failed to read standard input: {cause}"),
            Self::Output(cause) => write!(f, "failed to write standard output: {cause}"),
            Self::CallDepthExceeded => write!(f, "call depth limit exceeded"),
            Self::MissingMainClass => write!(f, "program has no class \"M\""),
            Self::MissingMainMethod => write!(f, "class \"M\" has no method \"m\""),
        }
    }
}

/// Internal parse failure, located but not yet resolved against the interner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub kind: ParseErrorKind,
    pub loc: SourceLoc,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, loc: SourceLoc) -> Self {
        Self { kind, loc }
    }
}

pub(crate) type ParseResult<T> = Result<T, ParseError>;

/// Internal link failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkError {
    pub kind: LinkErrorKind,
    pub loc: SourceLoc,
}

pub(crate) type LinkResult<T> = Result<T, LinkError>;

/// Internal runtime failure, raised at the currently executing opcode.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub loc: SourceLoc,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, loc: SourceLoc) -> Self {
        Self { kind, loc }
    }
}

pub(crate) type RunResult<T> = Result<T, RuntimeError>;

/// Public error type covering the whole pipeline.
///
/// Rendering follows the reference interpreter's diagnostic shape: a single
/// line with `file:line:col` followed by a fixed message.
#[derive(Debug)]
pub enum Error {
    /// A source or include file could not be opened or read.
    Io { path: PathBuf, source: io::Error },
    /// The source text failed to parse.
    Parse { pos: SourcePos, kind: ParseErrorKind },
    /// The inheritance graph failed validation.
    Link { pos: SourcePos, kind: LinkErrorKind },
    /// Execution aborted.
    Runtime { pos: SourcePos, kind: RuntimeErrorKind },
}

impl Error {
    pub(crate) fn parse(err: ParseError, interns: &Interns) -> Self {
        Self::Parse {
            pos: err.loc.resolve(interns),
            kind: err.kind,
        }
    }

    pub(crate) fn link(err: LinkError, interns: &Interns) -> Self {
        Self::Link {
            pos: err.loc.resolve(interns),
            kind: err.kind,
        }
    }

    pub(crate) fn runtime(err: RuntimeError, interns: &Interns) -> Self {
        Self::Runtime {
            pos: err.loc.resolve(interns),
            kind: err.kind,
        }
    }

    /// The resolved source position, when the error has one.
    #[must_use]
    pub fn pos(&self) -> Option<&SourcePos> {
        match self {
            Self::Io { .. } => None,
            Self::Parse { pos, .. } | Self::Link { pos, .. } | Self::Runtime { pos, .. } => {
                Some(pos)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { pos, kind } => write!(f, "{pos}: {kind}"),
            Self::Link { pos, kind } => write!(f, "{pos}: {kind}"),
            Self::Runtime { pos, kind } => write!(f, "{pos}: {kind}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
