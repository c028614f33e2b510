//! The five runtime-provided classes `A`, `I`, `O`, `S`, and `V`.
//!
//! Builtins are ordinary classes in the class map whose method bodies are a
//! single [`Opcode::Builtin`] instruction, so Glass programs instantiate and
//! call them exactly like user classes. The stack effects live here; the
//! interpreter dispatches to [`Interpreter::run_builtin`] when it executes
//! the opcode.
//!
//! Binary operations follow the reference convention: the first-popped value
//! is the right operand, so `<2><3>` followed by `A.s` computes `2 - 3`.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
    classes::{Class, ClassMap},
    code::{Instr, Opcode, SourceLoc},
    error::{RunResult, RuntimeError, RuntimeErrorKind},
    intern::Interns,
    io::{InputReader, OutputWriter},
    value::{NameRef, NameScope, Value},
    vm::Interpreter,
};

/// Identifies one builtin method. The display form is the conventional
/// `Class.method` notation used in diagnostics and documentation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize,
)]
pub enum Builtin {
    /// `I.l`: push the next input line followed by `\n`, or the empty
    /// string at end of input.
    #[strum(serialize = "I.l")]
    InputLine,
    /// `I.c`: push the next input byte as a one-character string, or the
    /// empty string at end of input.
    #[strum(serialize = "I.c")]
    InputChar,
    /// `I.e`: push 1 when the input is exhausted, else 0.
    #[strum(serialize = "I.e")]
    InputEof,

    /// `A.a`: addition.
    #[strum(serialize = "A.a")]
    MathAdd,
    /// `A.s`: subtraction.
    #[strum(serialize = "A.s")]
    MathSub,
    /// `A.m`: multiplication.
    #[strum(serialize = "A.m")]
    MathMult,
    /// `A.d`: division. Division by zero follows IEEE-754.
    #[strum(serialize = "A.d")]
    MathDiv,
    /// `A.mod`: floating-point remainder.
    #[strum(serialize = "A.mod")]
    MathMod,
    /// `A.f`: floor.
    #[strum(serialize = "A.f")]
    MathFloor,
    /// `A.e`: numeric equality, pushing 1 or 0.
    #[strum(serialize = "A.e")]
    MathEqual,
    /// `A.ne`: numeric inequality.
    #[strum(serialize = "A.ne")]
    MathNotEqual,
    /// `A.lt`: less-than.
    #[strum(serialize = "A.lt")]
    MathLessThan,
    /// `A.le`: less-or-equal.
    #[strum(serialize = "A.le")]
    MathLessOrEqual,
    /// `A.gt`: greater-than.
    #[strum(serialize = "A.gt")]
    MathGreaterThan,
    /// `A.ge`: greater-or-equal.
    #[strum(serialize = "A.ge")]
    MathGreaterOrEqual,

    /// `O.o`: write a string's bytes to the output.
    #[strum(serialize = "O.o")]
    OutputStr,
    /// `O.on`: write a number in shortest round-trip decimal form.
    #[strum(serialize = "O.on")]
    OutputNumber,

    /// `S.l`: string length in bytes.
    #[strum(serialize = "S.l")]
    StrLength,
    /// `S.i`: byte at an index as a one-character string; out of range
    /// yields the empty string.
    #[strum(serialize = "S.i")]
    StrIndex,
    /// `S.si`: replace the byte at an index; the index must be in range and
    /// the replacement exactly one byte.
    #[strum(serialize = "S.si")]
    StrReplace,
    /// `S.a`: concatenation, deeper operand first.
    #[strum(serialize = "S.a")]
    StrConcat,
    /// `S.d`: split into `[0, i)` and `[i, end)`, prefix pushed first.
    #[strum(serialize = "S.d")]
    StrSplit,
    /// `S.e`: string equality, pushing 1 or 0.
    #[strum(serialize = "S.e")]
    StrEqual,
    /// `S.ns`: byte value to one-character string.
    #[strum(serialize = "S.ns")]
    StrNumToChar,
    /// `S.sn`: first byte of a string to its numeric value.
    #[strum(serialize = "S.sn")]
    StrCharToNum,

    /// `V.n`: push a fresh name spelled `"0"`, `"1"`, ….
    #[strum(serialize = "V.n")]
    VarNew,
    /// `V.d`: delete a generated variable.
    #[strum(serialize = "V.d")]
    VarDelete,
}

impl Builtin {
    /// The fixed diagnostic used when this builtin's operands have the
    /// wrong kind.
    pub(crate) fn type_error_message(self) -> &'static str {
        match self {
            Self::MathAdd => "cannot add non-numbers",
            Self::MathSub => "cannot subtract non-numbers",
            Self::MathMult => "cannot multiply non-numbers",
            Self::MathDiv | Self::MathMod => "cannot divide non-numbers",
            Self::MathFloor => "cannot floor a non-number",
            Self::MathEqual
            | Self::MathNotEqual
            | Self::MathLessThan
            | Self::MathLessOrEqual
            | Self::MathGreaterThan
            | Self::MathGreaterOrEqual => "cannot compare non-numbers",
            Self::OutputStr => "cannot output a non-string as a string",
            Self::OutputNumber => "cannot output a non-number as a number",
            Self::StrLength => "cannot take the length of a non-string",
            Self::StrIndex => "wrong types for string indexing",
            Self::StrReplace => "wrong types for string replacement",
            Self::StrConcat => "cannot concatenate non-strings",
            Self::StrSplit => "wrong types for string splitting",
            Self::StrEqual => "cannot compare non-strings",
            Self::StrNumToChar => "cannot convert a non-number to a string",
            Self::StrCharToNum => "cannot convert a non-string to a number",
            Self::InputLine | Self::InputChar | Self::InputEof | Self::VarNew | Self::VarDelete => {
                "wrong operand types"
            }
        }
    }
}

/// The builtin classes and their method tables, in the order they are
/// installed into the class map.
pub(crate) const CATALOG: &[(&str, &[(&str, Builtin)])] = &[
    (
        "A",
        &[
            ("a", Builtin::MathAdd),
            ("s", Builtin::MathSub),
            ("m", Builtin::MathMult),
            ("d", Builtin::MathDiv),
            ("mod", Builtin::MathMod),
            ("f", Builtin::MathFloor),
            ("e", Builtin::MathEqual),
            ("ne", Builtin::MathNotEqual),
            ("lt", Builtin::MathLessThan),
            ("le", Builtin::MathLessOrEqual),
            ("gt", Builtin::MathGreaterThan),
            ("ge", Builtin::MathGreaterOrEqual),
        ],
    ),
    (
        "I",
        &[
            ("l", Builtin::InputLine),
            ("c", Builtin::InputChar),
            ("e", Builtin::InputEof),
        ],
    ),
    (
        "O",
        &[("o", Builtin::OutputStr), ("on", Builtin::OutputNumber)],
    ),
    (
        "S",
        &[
            ("l", Builtin::StrLength),
            ("i", Builtin::StrIndex),
            ("si", Builtin::StrReplace),
            ("a", Builtin::StrConcat),
            ("d", Builtin::StrSplit),
            ("e", Builtin::StrEqual),
            ("ns", Builtin::StrNumToChar),
            ("sn", Builtin::StrCharToNum),
        ],
    ),
    ("V", &[("n", Builtin::VarNew), ("d", Builtin::VarDelete)]),
];

/// Installs the five builtin classes into a fresh class map.
///
/// Runs before the root file parses so that a user class with the same name
/// is reported as a duplicate definition.
pub(crate) fn install(classes: &mut ClassMap, interns: &mut Interns, loc: SourceLoc) {
    for &(class_name, methods) in CATALOG {
        let id = interns.intern(class_name);
        let mut class = Class::new(id, loc);
        class.builtin = true;
        for &(method, builtin) in methods {
            class.add_method(
                interns.intern(method),
                vec![Instr::new(Opcode::Builtin(builtin), loc)],
            );
        }
        classes.insert(id, class);
    }
}

/// Renders a number in the shortest form that parses back to the same
/// double, with an integral `.0` suffix trimmed so whole numbers print the
/// way the reference interpreter prints them (`20`, not `20.0`).
pub(crate) fn format_number(value: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    let text = buffer.format(value);
    text.strip_suffix(".0").unwrap_or(text).to_owned()
}

impl<O: OutputWriter, I: InputReader> Interpreter<'_, O, I> {
    /// Performs one builtin's stack effect.
    pub(crate) fn run_builtin(&mut self, builtin: Builtin, loc: SourceLoc) -> RunResult<()> {
        match builtin {
            Builtin::InputLine => {
                let line = self
                    .input
                    .read_line()
                    .map_err(|err| RuntimeError::new(RuntimeErrorKind::Input(err.to_string()), loc))?;
                let bytes = match line {
                    Some(mut line) => {
                        line.push(b'\n');
                        line
                    }
                    None => Vec::new(),
                };
                self.push(Value::Str(bytes.into()));
            }
            Builtin::InputChar => {
                let byte = self
                    .input
                    .read_byte()
                    .map_err(|err| RuntimeError::new(RuntimeErrorKind::Input(err.to_string()), loc))?;
                let bytes: Vec<u8> = byte.into_iter().collect();
                self.push(Value::Str(bytes.into()));
            }
            Builtin::InputEof => {
                let eof = self
                    .input
                    .at_eof()
                    .map_err(|err| RuntimeError::new(RuntimeErrorKind::Input(err.to_string()), loc))?;
                self.push(Value::Num(if eof { 1.0 } else { 0.0 }));
            }

            Builtin::MathAdd
            | Builtin::MathSub
            | Builtin::MathMult
            | Builtin::MathDiv
            | Builtin::MathMod => {
                let right = self.pop_num(builtin, loc)?;
                let left = self.pop_num(builtin, loc)?;
                let result = match builtin {
                    Builtin::MathAdd => left + right,
                    Builtin::MathSub => left - right,
                    Builtin::MathMult => left * right,
                    Builtin::MathDiv => left / right,
                    _ => left % right,
                };
                self.push(Value::Num(result));
            }
            Builtin::MathFloor => {
                let value = self.pop_num(builtin, loc)?;
                self.push(Value::Num(value.floor()));
            }
            Builtin::MathEqual
            | Builtin::MathNotEqual
            | Builtin::MathLessThan
            | Builtin::MathLessOrEqual
            | Builtin::MathGreaterThan
            | Builtin::MathGreaterOrEqual => {
                let right = self.pop_num(builtin, loc)?;
                let left = self.pop_num(builtin, loc)?;
                let holds = match builtin {
                    Builtin::MathEqual => left == right,
                    Builtin::MathNotEqual => left != right,
                    Builtin::MathLessThan => left < right,
                    Builtin::MathLessOrEqual => left <= right,
                    Builtin::MathGreaterThan => left > right,
                    _ => left >= right,
                };
                self.push(Value::Num(if holds { 1.0 } else { 0.0 }));
            }

            Builtin::OutputStr => {
                let text = self.pop_str(builtin, loc)?;
                self.write_output(&text, loc)?;
            }
            Builtin::OutputNumber => {
                let value = self.pop_num(builtin, loc)?;
                let text = format_number(value);
                self.write_output(text.as_bytes(), loc)?;
            }

            Builtin::StrLength => {
                let text = self.pop_str(builtin, loc)?;
                self.push(Value::Num(text.len() as f64));
            }
            Builtin::StrIndex => {
                let index = self.pop_num(builtin, loc)?.trunc() as i64;
                let text = self.pop_str(builtin, loc)?;
                let bytes: Vec<u8> = usize::try_from(index)
                    .ok()
                    .and_then(|i| text.get(i))
                    .map(|&b| vec![b])
                    .unwrap_or_default();
                self.push(Value::Str(bytes.into()));
            }
            Builtin::StrReplace => {
                let replacement = self.pop_str(builtin, loc)?;
                let index = self.pop_num(builtin, loc)?.trunc() as i64;
                let text = self.pop_str(builtin, loc)?;
                if replacement.len() != 1 {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::ReplacementNotOneByte {
                            len: replacement.len(),
                        },
                        loc,
                    ));
                }
                let Some(slot) = usize::try_from(index).ok().filter(|&i| i < text.len()) else {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::StringIndexOutOfRange {
                            index,
                            len: text.len(),
                        },
                        loc,
                    ));
                };
                let mut bytes = text.to_vec();
                bytes[slot] = replacement[0];
                self.push(Value::Str(bytes.into()));
            }
            Builtin::StrConcat => {
                let right = self.pop_str(builtin, loc)?;
                let left = self.pop_str(builtin, loc)?;
                let mut bytes = left.to_vec();
                bytes.extend_from_slice(&right);
                self.push(Value::Str(bytes.into()));
            }
            Builtin::StrSplit => {
                let index = self.pop_num(builtin, loc)?.trunc();
                let text = self.pop_str(builtin, loc)?;
                let split = if index <= 0.0 {
                    0
                } else {
                    (index as usize).min(text.len())
                };
                self.push(Value::Str(text[..split].to_vec().into()));
                self.push(Value::Str(text[split..].to_vec().into()));
            }
            Builtin::StrEqual => {
                let right = self.pop_str(builtin, loc)?;
                let left = self.pop_str(builtin, loc)?;
                self.push(Value::Num(if left == right { 1.0 } else { 0.0 }));
            }
            Builtin::StrNumToChar => {
                let value = self.pop_num(builtin, loc)?;
                let byte = value.trunc() as i64 as u8;
                self.push(Value::Str(vec![byte].into()));
            }
            Builtin::StrCharToNum => {
                let text = self.pop_str(builtin, loc)?;
                let Some(&byte) = text.first() else {
                    return Err(RuntimeError::new(RuntimeErrorKind::EmptyStringToNumber, loc));
                };
                self.push(Value::Num(f64::from(byte)));
            }

            Builtin::VarNew => {
                let spelling = self.next_dynamic.to_string();
                self.next_dynamic += 1;
                let id = self.interns.intern(&spelling);
                self.push(Value::Name(NameRef {
                    id,
                    scope: NameScope::Dynamic,
                }));
            }
            Builtin::VarDelete => {
                let value = self.pop(loc)?;
                let Some(name) = value.as_name() else {
                    return Err(RuntimeError::new(RuntimeErrorKind::DeleteNonName, loc));
                };
                let spelling = self.interns.get(name.id);
                let generated =
                    !spelling.is_empty() && spelling.bytes().all(|b| b.is_ascii_digit());
                if !generated {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::DeleteNonGenerated(spelling.to_owned()),
                        loc,
                    ));
                }
                self.globals.remove(&name.id);
            }
        }
        Ok(())
    }

    fn pop_num(&mut self, builtin: Builtin, loc: SourceLoc) -> RunResult<f64> {
        self.pop(loc)?
            .as_num()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::BuiltinType(builtin), loc))
    }

    fn pop_str(&mut self, builtin: Builtin, loc: SourceLoc) -> RunResult<Rc<[u8]>> {
        match self.pop(loc)? {
            Value::Str(text) => Ok(text),
            _ => Err(RuntimeError::new(RuntimeErrorKind::BuiltinType(builtin), loc)),
        }
    }

    fn write_output(&mut self, bytes: &[u8], loc: SourceLoc) -> RunResult<()> {
        self.output
            .write_bytes(bytes)
            .map_err(|err| RuntimeError::new(RuntimeErrorKind::Output(err.to_string()), loc))
    }
}
