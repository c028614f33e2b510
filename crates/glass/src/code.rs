//! The opcode-level intermediate representation.
//!
//! Each method body is a flat `Vec<Instr>`; the only branching opcodes are
//! the loop pair, which reference each other by absolute index. Every
//! instruction records the source position it was parsed from so runtime
//! diagnostics can point back at the offending character.
//!
//! The fused opcodes (`Call`, `NewInstance`, `Store`) exist only after the
//! optimizer has run; the parser never emits them, and the minifier refuses
//! to render them.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{
    builtins::Builtin,
    intern::{FileId, StringId},
    value::NameRef,
};

/// Compact source position: interned file plus 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SourceLoc {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
}

/// One instruction of a method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Opcode {
    /// Push a name value.
    PushName(NameRef),
    /// Push a number value.
    PushNum(f64),
    /// Push a string value.
    PushStr(Rc<[u8]>),
    /// Duplicate the k-th element from the top (0 is the top itself).
    Dup(usize),
    /// Discard the top of the stack.
    Pop,
    /// Leave the current frame.
    Return,
    /// Pop a name; bind the currently executing object to it.
    AssignSelf,
    /// Pop a value, pop a name; bind the value to the name.
    AssignValue,
    /// Pop a class name, pop a target name; construct an instance, bind it,
    /// then run its constructor if the class defines one.
    AssignClass,
    /// Pop a name; push the value it denotes.
    GetValue,
    /// Pop a method name, pop an object name; push the bound method.
    GetFunction,
    /// Pop a bound method and invoke it.
    Execute,
    /// Test the loop variable; when falsy, jump past the matching `LoopEnd`.
    LoopBegin { var: NameRef, end: usize },
    /// Test the loop variable; when truthy, jump past the matching
    /// `LoopBegin`.
    LoopEnd { var: NameRef, start: usize },
    /// Perform a builtin's stack effect.
    Builtin(Builtin),
    /// Fused `PushName; PushName; GetFunction; Execute`.
    Call { object: NameRef, method: StringId },
    /// Fused `PushName; PushName; AssignClass`.
    NewInstance { target: NameRef, class: StringId },
    /// Fused assignment: pop the top of the stack and bind it.
    Store(NameRef),
    /// Placeholder left by the optimizer; removed before execution.
    Nop,
}

/// An opcode together with the source position it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Instr {
    pub op: Opcode,
    pub loc: SourceLoc,
}

impl Instr {
    pub fn new(op: Opcode, loc: SourceLoc) -> Self {
        Self { op, loc }
    }
}

/// Recomputes the paired absolute indices of every `LoopBegin`/`LoopEnd`.
///
/// Any pass that inserts or removes instructions (the inheritance linker,
/// the optimizer's nop sweep) leaves the stored indices stale; a single scan
/// with a matching stack restores the bijection. The parser guarantees loops
/// are balanced, so an unmatched `LoopEnd` here is a logic error.
pub(crate) fn repair_loop_jumps(code: &mut [Instr]) {
    let mut open: smallvec::SmallVec<[usize; 8]> = smallvec::SmallVec::new();
    for index in 0..code.len() {
        match code[index].op {
            Opcode::LoopBegin { .. } => open.push(index),
            Opcode::LoopEnd { .. } => {
                let begin = open.pop().expect("unmatched LoopEnd survived parsing");
                if let Opcode::LoopEnd { ref mut start, .. } = code[index].op {
                    *start = begin;
                }
                if let Opcode::LoopBegin { ref mut end, .. } = code[begin].op {
                    *end = index;
                }
            }
            _ => {}
        }
    }
    debug_assert!(open.is_empty(), "unmatched LoopBegin survived parsing");
}
