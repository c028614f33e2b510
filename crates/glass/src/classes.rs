//! Classes and the inheritance linker.
//!
//! Parsing produces a [`ClassMap`] whose classes may still carry parent
//! lists. [`link`] validates the parent graph (every parent defined, no
//! cycles) and then flattens inheritance: non-constructor methods are copied
//! into the child unless the child already defines them, and parent
//! constructors are spliced into the child constructor through synthetic
//! uniquely-named methods so they run before the child's own body. After
//! linking every `parents` list is empty and method dispatch is a plain name
//! lookup on the instance's own class.

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    code::{Instr, Opcode, SourceLoc, repair_loop_jumps},
    error::{LinkError, LinkErrorKind, LinkResult},
    intern::{Interns, StringId},
    value::{NameRef, NameScope},
};

/// A Glass class: a name and an ordered method table.
///
/// `parents` is only populated between parsing and linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Class {
    pub name: StringId,
    /// Position of the class name in its declaration, for link diagnostics.
    pub loc: SourceLoc,
    /// Declared parents in source order, cleared by [`link`].
    pub parents: SmallVec<[(StringId, SourceLoc); 2]>,
    /// Methods in declaration order. Order matters only for deterministic
    /// re-rendering; dispatch is by name.
    pub methods: IndexMap<StringId, Vec<Instr>>,
    /// True for the five runtime-provided classes, which the minifier skips.
    pub builtin: bool,
}

impl Class {
    pub fn new(name: StringId, loc: SourceLoc) -> Self {
        Self {
            name,
            loc,
            parents: SmallVec::new(),
            methods: IndexMap::new(),
            builtin: false,
        }
    }

    /// Adds a method unless one with the same name exists. Returns whether
    /// the class already had it.
    pub fn add_method(&mut self, name: StringId, body: Vec<Instr>) -> bool {
        if self.methods.contains_key(&name) {
            return true;
        }
        self.methods.insert(name, body);
        false
    }

    /// Adds a parent unless it is already declared. Returns whether it was
    /// a duplicate.
    pub fn add_parent(&mut self, parent: StringId, loc: SourceLoc) -> bool {
        if self.parents.iter().any(|(id, _)| *id == parent) {
            return true;
        }
        self.parents.push((parent, loc));
        false
    }
}

/// All classes of a program, in definition order.
pub(crate) type ClassMap = IndexMap<StringId, Class>;

/// Node state for the cycle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unvisited,
    Processing,
    Processed,
}

/// Validates the parent graph: every parent must exist and the graph must be
/// acyclic. Also returns a dependency order with ancestors first.
fn check_inheritance(classes: &ClassMap, interns: &Interns) -> LinkResult<Vec<StringId>> {
    let mut states: AHashMap<StringId, State> =
        classes.keys().map(|&id| (id, State::Unvisited)).collect();
    let mut order = Vec::with_capacity(classes.len());

    // Explicit stack so deep (if degenerate) parent chains cannot overflow.
    // An entry is (class, next parent index to look at).
    let mut stack: Vec<(StringId, usize)> = Vec::new();

    for &start in classes.keys() {
        if states[&start] != State::Unvisited {
            continue;
        }
        states.insert(start, State::Processing);
        stack.push((start, 0));
        while let Some(&(id, next)) = stack.last() {
            let class = &classes[&id];
            if next == class.parents.len() {
                states.insert(id, State::Processed);
                order.push(id);
                stack.pop();
                continue;
            }
            stack.last_mut().expect("stack is non-empty").1 += 1;
            let (parent, parent_loc) = class.parents[next];
            match states.get(&parent) {
                None => {
                    return Err(LinkError {
                        kind: LinkErrorKind::UndefinedParent {
                            class: interns.get(id).to_owned(),
                            parent: interns.get(parent).to_owned(),
                        },
                        loc: parent_loc,
                    });
                }
                Some(State::Processing) => {
                    return Err(LinkError {
                        kind: LinkErrorKind::InheritanceCycle {
                            class: interns.get(parent).to_owned(),
                        },
                        loc: parent_loc,
                    });
                }
                Some(State::Processed) => {}
                Some(State::Unvisited) => {
                    states.insert(parent, State::Processing);
                    stack.push((parent, 0));
                }
            }
        }
    }

    Ok(order)
}

/// Resolves inheritance for every class in the map.
///
/// Classes are processed ancestors-first, so a parent is always fully linked
/// before its children copy from it. Constructor merging follows the
/// reference interpreter: the parent constructor is installed on the child
/// under a fresh synthetic name (`c__<Parent>` plus as many underscores as
/// needed to stay unique across the whole program), and a call to it through
/// the `_t` self-temporary is inserted at the front of the child
/// constructor. With several parents the calls stack up so the
/// first-declared parent's constructor runs last before the child body.
pub(crate) fn link(classes: &mut ClassMap, interns: &mut Interns) -> LinkResult<()> {
    let order = check_inheritance(classes, interns)?;

    // Synthetic constructor names must not collide with any method name
    // anywhere in the program, so gather them all up front.
    let mut method_names: AHashSet<String> = classes
        .values()
        .flat_map(|class| class.methods.keys())
        .map(|&id| interns.get(id).to_owned())
        .collect();

    for class_id in order {
        let parents = std::mem::take(&mut classes[&class_id].parents);
        if parents.is_empty() {
            continue;
        }
        let loc = classes[&class_id].loc;

        for (parent_id, _) in parents {
            let parent_methods: Vec<(StringId, Vec<Instr>)> = classes[&parent_id]
                .methods
                .iter()
                .map(|(&name, body)| (name, body.clone()))
                .collect();

            for (name, body) in parent_methods {
                if name != Interns::CTOR {
                    classes[&class_id].add_method(name, body);
                    continue;
                }

                let mut ctor_name = format!("c__{}", interns.get(parent_id));
                while method_names.contains(&ctor_name) {
                    ctor_name.push('_');
                }
                method_names.insert(ctor_name.clone());
                let synthetic = NameRef::intern(&ctor_name, interns);

                let child = &mut classes[&class_id];
                child.methods.insert(synthetic.id, body);

                let self_tmp = NameRef {
                    id: Interns::SELF_TMP,
                    scope: NameScope::Local,
                };
                let ctor = child.methods.entry(Interns::CTOR).or_default();
                if !starts_with_self_binding(ctor) {
                    ctor.insert(0, Instr::new(Opcode::AssignSelf, loc));
                    ctor.insert(0, Instr::new(Opcode::PushName(self_tmp), loc));
                }
                let call = [
                    Instr::new(Opcode::PushName(self_tmp), loc),
                    Instr::new(Opcode::PushName(synthetic), loc),
                    Instr::new(Opcode::GetFunction, loc),
                    Instr::new(Opcode::Execute, loc),
                ];
                for (offset, instr) in call.into_iter().enumerate() {
                    ctor.insert(2 + offset, instr);
                }
                // The insertions shifted everything after the front, so any
                // loop pair indices in the original body are stale.
                repair_loop_jumps(ctor);
            }
        }
    }

    Ok(())
}

/// Whether a constructor already begins with `PushName "_t"; AssignSelf`.
fn starts_with_self_binding(ctor: &[Instr]) -> bool {
    matches!(
        ctor.first().map(|instr| &instr.op),
        Some(Opcode::PushName(name)) if name.id == Interns::SELF_TMP
    ) && matches!(ctor.get(1).map(|instr| &instr.op), Some(Opcode::AssignSelf))
}
