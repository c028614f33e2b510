//! Rendering a parsed program back to Glass source.
//!
//! Drives both `--convert` (original identifiers; the output is a
//! standards-compliant program because includes were flattened and
//! inheritance resolved before rendering) and `--minify` (identifiers
//! renamed to the shortest spellings still unused). Builtin classes are
//! never rendered.
//!
//! Must run before the optimizer: the fused opcodes have no source spelling.

use ahash::{AHashMap, AHashSet};

use crate::{
    builtins::{self, format_number},
    classes::ClassMap,
    code::Opcode,
    intern::{Interns, StringId},
};

/// Renders the class map as Glass source bytes.
///
/// `rename` switches minification on; `width` wraps the output at token
/// boundaries to at most that many columns (`0` disables wrapping). Tokens
/// are never split, so wrapping cannot corrupt string literals.
///
/// # Panics
/// Panics if the program was optimized first; fused opcodes cannot be
/// rendered as source.
pub(crate) fn render(classes: &ClassMap, interns: &Interns, rename: bool, width: usize) -> Vec<u8> {
    let mut names = Renamer::new(rename, interns);
    let mut out = Emitter::new(width);

    for class in classes.values().filter(|class| !class.builtin) {
        out.token(b"{");
        out.token(names.rendered(class.name, interns).as_bytes());
        for (&method, body) in &class.methods {
            out.token(b"[");
            out.token(names.rendered(method, interns).as_bytes());
            for instr in body {
                match &instr.op {
                    Opcode::PushName(name) => {
                        out.token(names.rendered(name.id, interns).as_bytes());
                    }
                    Opcode::PushNum(value) => {
                        let mut token = Vec::new();
                        token.push(b'<');
                        token.extend_from_slice(format_number(*value).as_bytes());
                        token.push(b'>');
                        out.token(&token);
                    }
                    Opcode::PushStr(bytes) => {
                        let mut token = vec![b'"'];
                        escape_into(bytes, &mut token);
                        token.push(b'"');
                        out.token(&token);
                    }
                    Opcode::Dup(count) => {
                        if *count <= 9 {
                            out.token(&[b'0' + *count as u8]);
                        } else {
                            out.token(format!("({count})").as_bytes());
                        }
                    }
                    Opcode::Pop => out.token(b","),
                    Opcode::Return => out.token(b"^"),
                    Opcode::AssignSelf => out.token(b"$"),
                    Opcode::AssignValue => out.token(b"="),
                    Opcode::AssignClass => out.token(b"!"),
                    Opcode::GetValue => out.token(b"*"),
                    Opcode::GetFunction => out.token(b"."),
                    Opcode::Execute => out.token(b"?"),
                    Opcode::LoopBegin { var, .. } => {
                        let mut token = vec![b'/'];
                        token.extend_from_slice(names.rendered(var.id, interns).as_bytes());
                        out.token(&token);
                    }
                    Opcode::LoopEnd { .. } => out.token(b"\\"),
                    Opcode::Builtin(_) => {
                        unreachable!("builtin opcodes only occur in builtin classes")
                    }
                    Opcode::Call { .. }
                    | Opcode::NewInstance { .. }
                    | Opcode::Store(_)
                    | Opcode::Nop => {
                        panic!("cannot render an optimized program as source")
                    }
                }
            }
            out.token(b"]");
        }
        out.token(b"}");
    }

    out.finish()
}

/// Appends a string literal's bytes with the escapes the parser understands.
fn escape_into(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        match byte {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x07 => out.extend_from_slice(b"\\a"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x1b => out.extend_from_slice(b"\\e"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0b => out.extend_from_slice(b"\\v"),
            other => out.push(other),
        }
    }
}

/// Output accumulator with token-granular line wrapping.
struct Emitter {
    out: Vec<u8>,
    width: usize,
    line_len: usize,
}

impl Emitter {
    fn new(width: usize) -> Self {
        Self {
            out: Vec::new(),
            width,
            line_len: 0,
        }
    }

    fn token(&mut self, token: &[u8]) {
        if self.width > 0 && self.line_len > 0 && self.line_len + token.len() > self.width {
            self.out.push(b'\n');
            self.line_len = 0;
        }
        self.out.extend_from_slice(token);
        self.line_len += token.len();
    }

    fn finish(self) -> Vec<u8> {
        self.out
    }
}

/// Names that must survive minification unchanged: the builtin classes and
/// their methods, the entry points, and the constructor/destructor names.
fn reserved_names() -> impl Iterator<Item = &'static str> {
    builtins::CATALOG
        .iter()
        .flat_map(|&(class, methods)| {
            std::iter::once(class).chain(methods.iter().map(|&(method, _)| method))
        })
        .chain(["M", "m", "c__", "d__"])
}

/// Assigns shortest-available spellings per scope, keeping reserved names
/// fixed. Each scope counts through `a`, `b`, …, `z`, `aa`, … with the
/// global counter rendered with its first letter uppercased and the local
/// counter prefixed with an underscore.
struct Renamer {
    enabled: bool,
    assigned: AHashMap<StringId, String>,
    used: AHashSet<String>,
    upper: String,
    lower: String,
    under: String,
}

impl Renamer {
    fn new(enabled: bool, interns: &Interns) -> Self {
        let mut assigned = AHashMap::new();
        let mut used = AHashSet::new();
        if enabled {
            for name in reserved_names() {
                if let Some(id) = interns.lookup(name) {
                    assigned.insert(id, name.to_owned());
                }
                used.insert(name.to_owned());
            }
        }
        Self {
            enabled,
            assigned,
            used,
            // One step before "a": incrementing yields the first name.
            upper: "`".to_owned(),
            lower: "`".to_owned(),
            under: "`".to_owned(),
        }
    }

    /// The (possibly renamed) source token for a name, parenthesized when
    /// longer than one character.
    fn rendered(&mut self, id: StringId, interns: &Interns) -> String {
        let name = if self.enabled {
            self.replacement(id, interns)
        } else {
            interns.get(id).to_owned()
        };
        if name.len() > 1 {
            format!("({name})")
        } else {
            name
        }
    }

    fn replacement(&mut self, id: StringId, interns: &Interns) -> String {
        if let Some(existing) = self.assigned.get(&id) {
            return existing.clone();
        }
        let original = interns.get(id);
        let fresh = match original.as_bytes()[0] {
            b'_' => loop {
                increment_name(&mut self.under);
                let candidate = format!("_{}", self.under);
                if !self.used.contains(&candidate) {
                    break candidate;
                }
            },
            first if first.is_ascii_uppercase() => loop {
                increment_name(&mut self.upper);
                let mut candidate = self.upper.clone();
                candidate[..1].make_ascii_uppercase();
                if !self.used.contains(&candidate) {
                    break candidate;
                }
            },
            _ => loop {
                increment_name(&mut self.lower);
                if !self.used.contains(&self.lower) {
                    break self.lower.clone();
                }
            },
        };
        self.used.insert(fresh.clone());
        self.assigned.insert(id, fresh.clone());
        fresh
    }
}

/// Increments a base-26 counter: `a` becomes `b`, `az` becomes `ba`, `zz`
/// becomes `aaa`.
fn increment_name(name: &mut String) {
    // Counters only ever hold ASCII letters (plus the initial pre-"a"
    // backtick), so working bytewise is fine.
    let mut bytes = std::mem::take(name).into_bytes();
    let mut carried = true;
    for slot in bytes.iter_mut().rev() {
        if *slot == b'z' {
            *slot = b'a';
        } else {
            *slot += 1;
            carried = false;
            break;
        }
    }
    if carried {
        bytes.push(b'a');
    }
    *name = String::from_utf8(bytes).expect("counter stays ASCII");
}
