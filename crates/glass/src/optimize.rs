//! Peephole optimizer.
//!
//! Three window rewrites collapse the most common opcode shapes, then a
//! sweep removes the `Nop` placeholders and recomputes every loop pair's
//! absolute indices. Each pass is pure over a single method body.
//!
//! The rewrites:
//! - `PushName o; PushName f; GetFunction; Execute` becomes `Call(o, f)`,
//!   the dominant call shape `(o)(f).?`.
//! - `PushName n; PushName c; AssignClass` becomes `NewInstance(n, c)`.
//! - `PushName n; Dup 1; AssignValue` becomes a `Store` of the stack top:
//!   followed by `Pop` the whole window collapses to `Store n`; without the
//!   `Pop` it becomes `Dup 0; Store n`, preserving the copy the original
//!   sequence left behind.

use crate::{
    classes::ClassMap,
    code::{Instr, Opcode, repair_loop_jumps},
};

/// Optimizes every method of every class in place.
pub(crate) fn optimize_classes(classes: &mut ClassMap) {
    for class in classes.values_mut() {
        for body in class.methods.values_mut() {
            collapse(body);
            remove_nops(body);
        }
    }
}

/// Applies the window rewrites, leaving `Nop`s behind for the sweep.
fn collapse(code: &mut [Instr]) {
    for index in 0..code.len() {
        match code[index].op {
            Opcode::AssignClass => fuse_instantiation(code, index),
            Opcode::AssignValue => fuse_assignment(code, index),
            Opcode::Execute => fuse_call(code, index),
            _ => {}
        }
    }
}

fn fuse_instantiation(code: &mut [Instr], index: usize) {
    if index < 2 {
        return;
    }
    let names = match (&code[index - 2].op, &code[index - 1].op) {
        (Opcode::PushName(target), Opcode::PushName(class)) => Some((*target, *class)),
        _ => None,
    };
    let Some((target, class)) = names else { return };
    code[index].op = Opcode::NewInstance {
        target,
        class: class.id,
    };
    code[index - 1].op = Opcode::Nop;
    code[index - 2].op = Opcode::Nop;
}

fn fuse_call(code: &mut [Instr], index: usize) {
    if index < 3 {
        return;
    }
    let names = match (&code[index - 3].op, &code[index - 2].op, &code[index - 1].op) {
        (Opcode::PushName(object), Opcode::PushName(method), Opcode::GetFunction) => {
            Some((*object, *method))
        }
        _ => None,
    };
    let Some((object, method)) = names else { return };
    // The fused opcode reports errors where the `.` retrieval happened,
    // matching the unfused sequence's diagnostics.
    code[index].loc = code[index - 1].loc;
    code[index].op = Opcode::Call {
        object,
        method: method.id,
    };
    code[index - 1].op = Opcode::Nop;
    code[index - 2].op = Opcode::Nop;
    code[index - 3].op = Opcode::Nop;
}

fn fuse_assignment(code: &mut [Instr], index: usize) {
    if index < 2 {
        return;
    }
    let name = match (&code[index - 2].op, &code[index - 1].op) {
        (Opcode::PushName(name), Opcode::Dup(1)) => Some(*name),
        _ => None,
    };
    let Some(name) = name else { return };
    if matches!(code.get(index + 1).map(|instr| &instr.op), Some(Opcode::Pop)) {
        code[index - 2].op = Opcode::Store(name);
        code[index - 1].op = Opcode::Nop;
        code[index].op = Opcode::Nop;
        code[index + 1].op = Opcode::Nop;
    } else {
        code[index - 2].op = Opcode::Dup(0);
        code[index - 1].op = Opcode::Store(name);
        code[index].op = Opcode::Nop;
    }
}

/// Drops `Nop`s and restores the loop-pair index bijection.
fn remove_nops(code: &mut Vec<Instr>) {
    code.retain(|instr| !matches!(instr.op, Opcode::Nop));
    repair_loop_jumps(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        code::SourceLoc,
        intern::Interns,
        value::NameRef,
    };

    fn loc() -> SourceLoc {
        SourceLoc {
            file: Interns::new().add_file("test.glass"),
            line: 1,
            col: 1,
        }
    }

    fn name(interns: &mut Interns, text: &str) -> NameRef {
        NameRef::intern(text, interns)
    }

    fn body(ops: impl IntoIterator<Item = Opcode>) -> Vec<Instr> {
        ops.into_iter().map(|op| Instr::new(op, loc())).collect()
    }

    #[test]
    fn fuses_call_window() {
        let mut interns = Interns::new();
        let object = name(&mut interns, "_o");
        let method = name(&mut interns, "go");
        let mut code = body([
            Opcode::PushName(object),
            Opcode::PushName(method),
            Opcode::GetFunction,
            Opcode::Execute,
        ]);
        collapse(&mut code);
        remove_nops(&mut code);
        assert_eq!(code.len(), 1);
        assert_eq!(
            code[0].op,
            Opcode::Call {
                object,
                method: method.id
            }
        );
    }

    #[test]
    fn fuses_instantiation_window() {
        let mut interns = Interns::new();
        let target = name(&mut interns, "_x");
        let class = name(&mut interns, "C");
        let mut code = body([
            Opcode::PushName(target),
            Opcode::PushName(class),
            Opcode::AssignClass,
        ]);
        collapse(&mut code);
        remove_nops(&mut code);
        assert_eq!(code.len(), 1);
        assert_eq!(
            code[0].op,
            Opcode::NewInstance {
                target,
                class: class.id
            }
        );
    }

    #[test]
    fn fuses_assignment_with_following_pop() {
        let mut interns = Interns::new();
        let target = name(&mut interns, "n");
        let mut code = body([
            Opcode::PushNum(1.0),
            Opcode::PushName(target),
            Opcode::Dup(1),
            Opcode::AssignValue,
            Opcode::Pop,
        ]);
        collapse(&mut code);
        remove_nops(&mut code);
        assert_eq!(code.len(), 2);
        assert_eq!(code[1].op, Opcode::Store(target));
    }

    #[test]
    fn fuses_assignment_without_following_pop() {
        let mut interns = Interns::new();
        let target = name(&mut interns, "n");
        let mut code = body([
            Opcode::PushNum(1.0),
            Opcode::PushName(target),
            Opcode::Dup(1),
            Opcode::AssignValue,
        ]);
        collapse(&mut code);
        remove_nops(&mut code);
        assert_eq!(code.len(), 3);
        assert_eq!(code[1].op, Opcode::Dup(0));
        assert_eq!(code[2].op, Opcode::Store(target));
    }

    #[test]
    fn nop_removal_repairs_loop_jumps() {
        let mut interns = Interns::new();
        let object = name(&mut interns, "_o");
        let method = name(&mut interns, "go");
        let var = name(&mut interns, "c");
        // A call window ahead of the loop shifts every later index by three
        // once fused.
        let mut code = body([
            Opcode::PushName(object),
            Opcode::PushName(method),
            Opcode::GetFunction,
            Opcode::Execute,
            Opcode::LoopBegin { var, end: 6 },
            Opcode::PushNum(0.0),
            Opcode::LoopEnd { var, start: 4 },
        ]);
        collapse(&mut code);
        remove_nops(&mut code);
        assert_eq!(code.len(), 4);
        assert_eq!(code[1].op, Opcode::LoopBegin { var, end: 3 });
        assert_eq!(code[3].op, Opcode::LoopEnd { var, start: 1 });
    }

    #[test]
    fn short_prefixes_are_left_alone() {
        let mut interns = Interns::new();
        let target = name(&mut interns, "_x");
        let mut code = body([Opcode::PushName(target), Opcode::AssignClass]);
        collapse(&mut code);
        remove_nops(&mut code);
        assert_eq!(code.len(), 2);
    }
}
