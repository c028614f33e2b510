//! The tree-walking interpreter.
//!
//! One [`Interpreter`] aggregate owns every piece of runtime state — operand
//! stack, globals, arena, frame stack, dynamic-name counter — so several
//! programs can run in one process without sharing anything. Execution is a
//! fetch-decode loop per method body; the loop pair are the only branching
//! opcodes, and calls run nested, pushing a frame and recursing into the
//! callee's body.
//!
//! Every error carries the location of the opcode that raised it and aborts
//! the run; nothing is caught.

use ahash::AHashMap;

use crate::{
    code::{Instr, Opcode, SourceLoc},
    error::{RunResult, RuntimeError, RuntimeErrorKind},
    heap::{Heap, InstanceId},
    intern::{Interns, StringId},
    io::{InputReader, OutputWriter},
    run::Program,
    value::{BoundMethod, NameRef, NameScope, Value},
};

/// Upper bound on nested calls, guarding the host stack against runaway
/// Glass recursion.
const MAX_CALL_DEPTH: usize = 1024;

/// Per-invocation state: the frame's locals and the object executing the
/// method.
#[derive(Debug)]
struct Frame {
    locals: AHashMap<StringId, Value>,
    this: InstanceId,
}

/// All runtime state for one program execution.
pub(crate) struct Interpreter<'a, O: OutputWriter, I: InputReader> {
    program: &'a Program,
    pub(crate) interns: &'a mut Interns,
    pub(crate) output: &'a mut O,
    pub(crate) input: &'a mut I,
    heap: Heap,
    stack: Vec<Value>,
    pub(crate) globals: AHashMap<StringId, Value>,
    frames: Vec<Frame>,
    /// Counter behind `V.n`'s generated spellings.
    pub(crate) next_dynamic: u64,
}

impl<'a, O: OutputWriter, I: InputReader> Interpreter<'a, O, I> {
    pub fn new(
        program: &'a Program,
        interns: &'a mut Interns,
        output: &'a mut O,
        input: &'a mut I,
    ) -> Self {
        Self {
            program,
            interns,
            output,
            input,
            heap: Heap::new(),
            stack: Vec::new(),
            globals: AHashMap::new(),
            frames: Vec::new(),
            next_dynamic: 0,
        }
    }

    /// Runs the program: binds `_Main` to a fresh instance of `M`, runs its
    /// constructor if it has one, then invokes `m`.
    pub fn run(&mut self) -> RunResult<()> {
        let loc = self.program.main_loc;
        if !self.program.classes.contains_key(&Interns::MAIN_CLASS) {
            return Err(RuntimeError::new(RuntimeErrorKind::MissingMainClass, loc));
        }
        let main = self.allocate_instance(Interns::MAIN_CLASS);
        self.globals
            .insert(Interns::MAIN_BINDING, Value::Instance(main));
        if self.method_body(Interns::MAIN_CLASS, Interns::CTOR).is_some() {
            self.call_method(main, Interns::CTOR, loc)?;
        }
        if self.method_body(Interns::MAIN_CLASS, Interns::MAIN_METHOD).is_none() {
            return Err(RuntimeError::new(RuntimeErrorKind::MissingMainMethod, loc));
        }
        self.call_method(main, Interns::MAIN_METHOD, loc)
    }

    /// Arena counters for inspection after a run.
    pub fn heap_stats(&self) -> crate::heap::HeapStats {
        self.heap.stats()
    }

    /// Looks up a method body. The borrow is tied to the program, not to
    /// `self`, so the caller can keep executing while holding it.
    fn method_body(&self, class: StringId, method: StringId) -> Option<&'a [Instr]> {
        let program: &'a Program = self.program;
        program
            .classes
            .get(&class)?
            .methods
            .get(&method)
            .map(Vec::as_slice)
    }

    /// Pushes a frame and executes `method` on `obj`.
    ///
    /// The binding was validated when the method reference was created, so
    /// a missing body here is an interpreter bug, not a user error.
    fn call_method(&mut self, obj: InstanceId, method: StringId, loc: SourceLoc) -> RunResult<()> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new(RuntimeErrorKind::CallDepthExceeded, loc));
        }
        let class = self.heap.get(obj).class;
        let code = self
            .method_body(class, method)
            .expect("bound method body must exist");
        self.frames.push(Frame {
            locals: AHashMap::new(),
            this: obj,
        });
        let result = self.execute(code);
        self.frames.pop();
        result
    }

    /// The fetch-decode loop over one method body.
    fn execute(&mut self, code: &[Instr]) -> RunResult<()> {
        let mut ip = 0;
        while ip < code.len() {
            let instr = &code[ip];
            let loc = instr.loc;
            match &instr.op {
                Opcode::PushName(name) => self.stack.push(Value::Name(*name)),
                Opcode::PushNum(value) => self.stack.push(Value::Num(*value)),
                Opcode::PushStr(bytes) => self.stack.push(Value::Str(bytes.clone())),
                Opcode::Dup(depth) => {
                    let len = self.stack.len();
                    if *depth >= len {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::DupOutOfRange { index: *depth },
                            loc,
                        ));
                    }
                    self.stack.push(self.stack[len - 1 - depth].clone());
                }
                Opcode::Pop => {
                    self.pop(loc)?;
                }
                Opcode::Return => return Ok(()),
                Opcode::AssignSelf => {
                    let name = self.pop_name(loc, RuntimeErrorKind::AssignToNonName)?;
                    let this = self.frame().this;
                    self.set_val(name, Value::Instance(this));
                }
                Opcode::AssignValue => {
                    let value = self.pop(loc)?;
                    let name = self.pop_name(loc, RuntimeErrorKind::AssignToNonName)?;
                    self.set_val(name, value);
                }
                Opcode::AssignClass => {
                    let class = self.pop(loc)?;
                    let target = self.pop_name(loc, RuntimeErrorKind::AssignToNonName)?;
                    let Some(class) = class.as_name() else {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::InstantiateNonName,
                            loc,
                        ));
                    };
                    self.instantiate(class.id, target, loc)?;
                }
                Opcode::GetValue => {
                    let name = self.pop_name(loc, RuntimeErrorKind::ValueOfNonName)?;
                    let value = self.get_val(name, loc)?;
                    self.stack.push(value);
                }
                Opcode::GetFunction => {
                    let method = self.pop_name(loc, RuntimeErrorKind::FunctionOfNonName)?;
                    let object = self.pop_name(loc, RuntimeErrorKind::FunctionOfNonName)?;
                    let bound = self.bind_method(object, method.id, loc)?;
                    self.stack.push(Value::Func(bound));
                }
                Opcode::Execute => {
                    let Value::Func(bound) = self.pop(loc)? else {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::ExecuteNonFunction,
                            loc,
                        ));
                    };
                    self.call_method(bound.obj, bound.method, loc)?;
                }
                Opcode::LoopBegin { var, end } => {
                    if !self.get_val(*var, loc)?.truthy() {
                        ip = end + 1;
                        continue;
                    }
                }
                Opcode::LoopEnd { var, start } => {
                    if self.get_val(*var, loc)?.truthy() {
                        ip = start + 1;
                        continue;
                    }
                }
                Opcode::Builtin(builtin) => self.run_builtin(*builtin, loc)?,
                Opcode::Call { object, method } => {
                    let bound = self.bind_method(*object, *method, loc)?;
                    self.call_method(bound.obj, bound.method, loc)?;
                }
                Opcode::NewInstance { target, class } => {
                    self.instantiate(*class, *target, loc)?;
                }
                Opcode::Store(name) => {
                    let value = self.pop(loc)?;
                    self.set_val(*name, value);
                }
                Opcode::Nop => {}
            }
            ip += 1;
        }
        Ok(())
    }

    /// Resolves `object`'s value and binds `method` on it, validating that
    /// the value is an instance and its class defines the method.
    fn bind_method(
        &mut self,
        object: NameRef,
        method: StringId,
        loc: SourceLoc,
    ) -> RunResult<BoundMethod> {
        let value = self.get_val(object, loc)?;
        let Value::Instance(id) = value else {
            return Err(RuntimeError::new(
                RuntimeErrorKind::FunctionFromNonInstance,
                loc,
            ));
        };
        let class = self.heap.get(id).class;
        if self.method_body(class, method).is_none() {
            return Err(RuntimeError::new(
                RuntimeErrorKind::UnknownMethod {
                    object: self.interns.get(object.id).to_owned(),
                    method: self.interns.get(method).to_owned(),
                },
                loc,
            ));
        }
        Ok(BoundMethod { obj: id, method })
    }

    /// Constructs an instance of `class`, binds it to `target`, then runs
    /// the constructor if the class defines one. The binding happens before
    /// the constructor so the new object is rooted while user code runs.
    fn instantiate(&mut self, class: StringId, target: NameRef, loc: SourceLoc) -> RunResult<()> {
        if !self.program.classes.contains_key(&class) {
            return Err(RuntimeError::new(
                RuntimeErrorKind::UnknownClass(self.interns.get(class).to_owned()),
                loc,
            ));
        }
        let id = self.allocate_instance(class);
        self.set_val(target, Value::Instance(id));
        if self.method_body(class, Interns::CTOR).is_some() {
            self.call_method(id, Interns::CTOR, loc)?;
        }
        Ok(())
    }

    /// Allocates from the arena, collecting (and possibly growing) first
    /// when it is full.
    fn allocate_instance(&mut self, class: StringId) -> InstanceId {
        if self.heap.is_full() {
            let roots = self.collect_roots();
            self.heap.collect(roots);
        }
        self.heap.allocate(class)
    }

    /// Every arena id reachable from the operand stack, the globals, and
    /// each live frame's locals and `this`.
    fn collect_roots(&self) -> Vec<InstanceId> {
        let stack_roots = self.stack.iter().filter_map(Value::root_id);
        let global_roots = self.globals.values().filter_map(Value::root_id);
        let frame_roots = self.frames.iter().flat_map(|frame| {
            frame
                .locals
                .values()
                .filter_map(Value::root_id)
                .chain(std::iter::once(frame.this))
        });
        stack_roots.chain(global_roots).chain(frame_roots).collect()
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("no executing frame")
    }

    /// Reads a name's binding from the scope its spelling selects.
    fn get_val(&self, name: NameRef, loc: SourceLoc) -> RunResult<Value> {
        let slot = match name.scope {
            NameScope::Local => self.frame().locals.get(&name.id),
            NameScope::Field => self.heap.get(self.frame().this).fields.get(&name.id),
            NameScope::Global | NameScope::Dynamic => self.globals.get(&name.id),
        };
        slot.cloned().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::Undefined(self.interns.get(name.id).to_owned()),
                loc,
            )
        })
    }

    /// Writes a name's binding, creating it when absent.
    fn set_val(&mut self, name: NameRef, value: Value) {
        match name.scope {
            NameScope::Local => {
                self.frames
                    .last_mut()
                    .expect("no executing frame")
                    .locals
                    .insert(name.id, value);
            }
            NameScope::Field => {
                let this = self.frame().this;
                self.heap.get_mut(this).fields.insert(name.id, value);
            }
            NameScope::Global | NameScope::Dynamic => {
                self.globals.insert(name.id, value);
            }
        }
    }

    pub(crate) fn pop(&mut self, loc: SourceLoc) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::EmptyStack, loc))
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop_name(&mut self, loc: SourceLoc, kind: RuntimeErrorKind) -> RunResult<NameRef> {
        self.pop(loc)?
            .as_name()
            .ok_or_else(|| RuntimeError::new(kind, loc))
    }
}
