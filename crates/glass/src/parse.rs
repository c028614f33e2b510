//! Character-driven parser from Glass source to the class map.
//!
//! The grammar is small enough that the parser works directly on bytes with
//! one character of lookahead: a program is a sequence of class definitions
//! (plus top-level include strings), a class is `{ Name Parent* Method* }`,
//! and a method body is a flat command sequence. Loops are emitted flat as a
//! `LoopBegin`/`LoopEnd` pair whose absolute indices are patched when the
//! closing `\` is seen.
//!
//! Two non-standard extensions are recognized unless pedantic mode is on:
//! parent names between a class name and its first method, and top-level
//! `"file"` strings that splice another file into the same flat class
//! namespace (recursively, de-duplicated by canonical path).

use std::path::{Path, PathBuf};

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::{
    builtins,
    classes::{Class, ClassMap},
    code::{Instr, Opcode, SourceLoc},
    error::{Error, ParseError, ParseErrorKind, ParseResult},
    intern::{FileId, Interns},
    reader::Reader,
    value::NameRef,
};

/// Parses a whole program from an in-memory source.
///
/// Builtin classes are installed first, then the source itself, then any
/// files it includes (resolved relative to the current directory, since an
/// in-memory source has no directory of its own).
pub(crate) fn parse_source(
    source: &[u8],
    file_name: &str,
    pedantic: bool,
    interns: &mut Interns,
) -> Result<(ClassMap, FileId), Error> {
    let mut classes = new_class_map(interns);
    let mut included = AHashSet::new();
    let (root, includes) = parse_text(source, file_name, pedantic, interns, &mut classes)
        .map_err(|err| Error::parse(err, interns))?;
    let base = PathBuf::from(".");
    for (include, _) in includes {
        parse_file_into(
            &base.join(include),
            pedantic,
            interns,
            &mut classes,
            &mut included,
        )?;
    }
    Ok((classes, root))
}

/// Parses a whole program starting from a file on disk.
pub(crate) fn parse_path(
    path: &Path,
    pedantic: bool,
    interns: &mut Interns,
) -> Result<(ClassMap, FileId), Error> {
    let mut classes = new_class_map(interns);
    let mut included = AHashSet::new();
    let root = parse_file_into(path, pedantic, interns, &mut classes, &mut included)?
        .expect("the root file is never a duplicate include");
    Ok((classes, root))
}

/// A class map pre-seeded with the builtin classes.
fn new_class_map(interns: &mut Interns) -> ClassMap {
    let mut classes = ClassMap::new();
    let builtin_file = interns.add_file("<builtins>");
    let loc = SourceLoc {
        file: builtin_file,
        line: 0,
        col: 0,
    };
    builtins::install(&mut classes, interns, loc);
    classes
}

/// Reads, de-duplicates, and parses one file, then recurses into its
/// includes (resolved relative to the file's own directory). Returns the
/// file's id, or `None` when it had already been included.
fn parse_file_into(
    path: &Path,
    pedantic: bool,
    interns: &mut Interns,
    classes: &mut ClassMap,
    included: &mut AHashSet<PathBuf>,
) -> Result<Option<FileId>, Error> {
    let canonical = path.canonicalize().map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    if !included.insert(canonical.clone()) {
        return Ok(None);
    }
    let source = std::fs::read(&canonical).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    let display = path.display().to_string();
    let (file, includes) = parse_text(&source, &display, pedantic, interns, classes)
        .map_err(|err| Error::parse(err, interns))?;
    let base = canonical.parent().map_or_else(|| PathBuf::from("."), Path::to_owned);
    for (include, _) in includes {
        parse_file_into(&base.join(include), pedantic, interns, classes, included)?;
    }
    Ok(Some(file))
}

/// Parses one source text into the shared class map, returning the file's
/// id and the include strings it mentioned.
fn parse_text(
    source: &[u8],
    file_name: &str,
    pedantic: bool,
    interns: &mut Interns,
    classes: &mut ClassMap,
) -> ParseResult<(FileId, Vec<(String, SourceLoc)>)> {
    let file = interns.add_file(file_name);
    let mut parser = Parser {
        reader: Reader::new(source),
        file,
        interns,
        pedantic,
    };
    let includes = parser.parse_program(classes)?;
    Ok((file, includes))
}

struct Parser<'a> {
    reader: Reader<'a>,
    file: FileId,
    interns: &'a mut Interns,
    pedantic: bool,
}

impl Parser<'_> {
    /// Position of the most recently read character.
    fn loc(&self) -> SourceLoc {
        let (line, col) = self.reader.pos();
        SourceLoc {
            file: self.file,
            line,
            col,
        }
    }

    fn fail<T>(&self, kind: ParseErrorKind) -> ParseResult<T> {
        Err(ParseError::new(kind, self.loc()))
    }

    /// Next character outside whitespace and comments.
    fn next_meaningful(&mut self) -> ParseResult<Option<u8>> {
        self.reader.next_meaningful().map_err(|(line, col)| {
            ParseError::new(
                ParseErrorKind::UnterminatedComment,
                SourceLoc {
                    file: self.file,
                    line,
                    col,
                },
            )
        })
    }

    /// Top level: classes and include strings until end of file.
    fn parse_program(&mut self, classes: &mut ClassMap) -> ParseResult<Vec<(String, SourceLoc)>> {
        let mut includes = Vec::new();
        while let Some(byte) = self.next_meaningful()? {
            match byte {
                b'{' => self.parse_class(classes)?,
                b'"' => {
                    let loc = self.loc();
                    if self.pedantic {
                        return Err(ParseError::new(ParseErrorKind::PedanticInclude, loc));
                    }
                    let bytes = self.read_string_literal()?;
                    includes.push((String::from_utf8_lossy(&bytes).into_owned(), loc));
                }
                other => return self.fail(ParseErrorKind::UnexpectedChar(char::from(other))),
            }
        }
        Ok(includes)
    }

    /// One `{ Name Parent* Method* }` definition.
    fn parse_class(&mut self, classes: &mut ClassMap) -> ParseResult<()> {
        let (name, name_loc) = self.read_name()?;
        if !name.as_bytes()[0].is_ascii_uppercase() {
            return Err(ParseError::new(ParseErrorKind::ClassNameCase(name), name_loc));
        }
        let class_id = self.interns.intern(&name);
        if classes.contains_key(&class_id) {
            return Err(ParseError::new(ParseErrorKind::DuplicateClass(name), name_loc));
        }
        let mut class = Class::new(class_id, name_loc);
        let mut seen_method = false;

        loop {
            let Some(byte) = self.next_meaningful()? else {
                return self.fail(ParseErrorKind::UnexpectedEof);
            };
            match byte {
                b'}' => break,
                b'[' => {
                    seen_method = true;
                    self.parse_method(&name, &mut class)?;
                }
                // An inheritance header entry. Only allowed between the
                // class name and the first method.
                b'(' | b'A'..=b'Z' | b'a'..=b'z' if !seen_method => {
                    let (parent, parent_loc) = self.read_name_from(byte)?;
                    if self.pedantic {
                        return Err(ParseError::new(
                            ParseErrorKind::PedanticParent { class: name },
                            parent_loc,
                        ));
                    }
                    if !parent.as_bytes()[0].is_ascii_uppercase() {
                        return Err(ParseError::new(
                            ParseErrorKind::ClassNameCase(parent),
                            parent_loc,
                        ));
                    }
                    let parent_id = self.interns.intern(&parent);
                    if class.add_parent(parent_id, parent_loc) {
                        return Err(ParseError::new(
                            ParseErrorKind::DuplicateParent {
                                class: name,
                                parent,
                            },
                            parent_loc,
                        ));
                    }
                }
                other => return self.fail(ParseErrorKind::UnexpectedChar(char::from(other))),
            }
        }

        classes.insert(class_id, class);
        Ok(())
    }

    /// One `[ Name Command* ]` definition.
    fn parse_method(&mut self, class_name: &str, class: &mut Class) -> ParseResult<()> {
        let (name, name_loc) = self.read_name()?;
        if !name.as_bytes()[0].is_ascii_lowercase() {
            return Err(ParseError::new(ParseErrorKind::MethodNameCase(name), name_loc));
        }
        let method_id = self.interns.intern(&name);
        let body = self.parse_commands()?;
        if class.add_method(method_id, body) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateMethod {
                    class: class_name.to_owned(),
                    method: name,
                },
                name_loc,
            ));
        }
        Ok(())
    }

    /// A command sequence terminated by `]`. Loops are parsed in the same
    /// flat pass; open loops are tracked on a stack and their begin/end
    /// indices patched when the matching `\` arrives.
    fn parse_commands(&mut self) -> ParseResult<Vec<Instr>> {
        let mut code: Vec<Instr> = Vec::new();
        let mut open_loops: SmallVec<[(usize, SourceLoc, NameRef); 4]> = SmallVec::new();

        loop {
            let Some(byte) = self.next_meaningful()? else {
                return self.fail(ParseErrorKind::UnexpectedEof);
            };
            let loc = self.loc();
            match byte {
                b']' => {
                    if let Some(&(_, begin_loc, _)) = open_loops.last() {
                        return Err(ParseError::new(ParseErrorKind::UnclosedLoop, begin_loc));
                    }
                    return Ok(code);
                }
                b',' => code.push(Instr::new(Opcode::Pop, loc)),
                b'^' => code.push(Instr::new(Opcode::Return, loc)),
                b'=' => code.push(Instr::new(Opcode::AssignValue, loc)),
                b'!' => code.push(Instr::new(Opcode::AssignClass, loc)),
                b'.' => code.push(Instr::new(Opcode::GetFunction, loc)),
                b'?' => code.push(Instr::new(Opcode::Execute, loc)),
                b'*' => code.push(Instr::new(Opcode::GetValue, loc)),
                b'$' => code.push(Instr::new(Opcode::AssignSelf, loc)),
                b'"' => {
                    let bytes = self.read_string_literal()?;
                    code.push(Instr::new(Opcode::PushStr(bytes.into()), loc));
                }
                b'<' => {
                    let value = self.read_number_literal(b'>')?;
                    code.push(Instr::new(Opcode::PushNum(value), loc));
                }
                b'/' => {
                    let (name, _) = self.read_name()?;
                    let var = NameRef::intern(&name, self.interns);
                    open_loops.push((code.len(), loc, var));
                    code.push(Instr::new(Opcode::LoopBegin { var, end: 0 }, loc));
                }
                b'\\' => {
                    let Some((begin, _, var)) = open_loops.pop() else {
                        return Err(ParseError::new(ParseErrorKind::StrayLoopEnd, loc));
                    };
                    let end = code.len();
                    if let Opcode::LoopBegin { end: ref mut jump, .. } = code[begin].op {
                        *jump = end;
                    }
                    code.push(Instr::new(Opcode::LoopEnd { var, start: begin }, loc));
                }
                b'(' => {
                    let Some(first) = self.reader.next() else {
                        return self.fail(ParseErrorKind::UnterminatedName);
                    };
                    if first.is_ascii_digit() {
                        self.reader.unget();
                        let value = self.read_number_literal(b')')?;
                        let count = dup_index(value)
                            .ok_or_else(|| ParseError::new(
                                ParseErrorKind::InvalidNumber(builtins::format_number(value)),
                                loc,
                            ))?;
                        code.push(Instr::new(Opcode::Dup(count), loc));
                    } else {
                        let (name, _) = self.read_paren_name(first, loc)?;
                        let name = NameRef::intern(&name, self.interns);
                        code.push(Instr::new(Opcode::PushName(name), loc));
                    }
                }
                b'0'..=b'9' => {
                    code.push(Instr::new(Opcode::Dup(usize::from(byte - b'0')), loc));
                }
                b'A'..=b'Z' | b'a'..=b'z' => {
                    let mut text = String::new();
                    text.push(char::from(byte));
                    let name = NameRef::intern(&text, self.interns);
                    code.push(Instr::new(Opcode::PushName(name), loc));
                }
                other => return self.fail(ParseErrorKind::UnexpectedChar(char::from(other))),
            }
        }
    }

    /// A name in either form: a single letter, or `( chars )`.
    fn read_name(&mut self) -> ParseResult<(String, SourceLoc)> {
        let Some(first) = self.reader.next() else {
            return self.fail(ParseErrorKind::UnterminatedName);
        };
        self.read_name_from(first)
    }

    /// As [`Self::read_name`], with the first character already consumed.
    fn read_name_from(&mut self, first: u8) -> ParseResult<(String, SourceLoc)> {
        let loc = self.loc();
        match first {
            b'(' => self.read_paren_name_first(loc),
            b'A'..=b'Z' | b'a'..=b'z' => Ok((char::from(first).to_string(), loc)),
            b'0'..=b'9' => Err(ParseError::new(
                ParseErrorKind::DigitNameStart(char::from(first)),
                loc,
            )),
            other => Err(ParseError::new(
                ParseErrorKind::InvalidNameStart(char::from(other)),
                loc,
            )),
        }
    }

    /// The body of a parenthesized name, with the opening `(` consumed.
    fn read_paren_name_first(&mut self, open_loc: SourceLoc) -> ParseResult<(String, SourceLoc)> {
        let Some(first) = self.reader.next() else {
            return self.fail(ParseErrorKind::UnterminatedName);
        };
        if first == b')' {
            return Err(ParseError::new(ParseErrorKind::EmptyName, open_loc));
        }
        self.read_paren_name(first, open_loc)
    }

    /// The body of a parenthesized name, with its first character already
    /// consumed.
    fn read_paren_name(&mut self, first: u8, open_loc: SourceLoc) -> ParseResult<(String, SourceLoc)> {
        let mut name = String::new();
        let mut byte = first;
        loop {
            match byte {
                b')' => break,
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => name.push(char::from(byte)),
                b'0'..=b'9' => {
                    if name.is_empty() {
                        return self.fail(ParseErrorKind::DigitNameStart(char::from(byte)));
                    }
                    name.push(char::from(byte));
                }
                other => return self.fail(ParseErrorKind::InvalidNameChar(char::from(other))),
            }
            let Some(next) = self.reader.next() else {
                return Err(ParseError::new(ParseErrorKind::UnterminatedName, open_loc));
            };
            byte = next;
        }
        if name.is_empty() {
            return Err(ParseError::new(ParseErrorKind::EmptyName, open_loc));
        }
        Ok((name, open_loc))
    }

    /// A `"` string literal body with escape processing; the opening quote
    /// is already consumed.
    fn read_string_literal(&mut self) -> ParseResult<Vec<u8>> {
        let open_loc = self.loc();
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.reader.next() else {
                return Err(ParseError::new(ParseErrorKind::UnterminatedString, open_loc));
            };
            match byte {
                b'"' => return Ok(bytes),
                b'\\' => {
                    let Some(escaped) = self.reader.next() else {
                        return Err(ParseError::new(ParseErrorKind::UnterminatedString, open_loc));
                    };
                    bytes.push(match escaped {
                        b'a' => 0x07,
                        b'b' => 0x08,
                        b'e' => 0x1b,
                        b'f' => 0x0c,
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        b'v' => 0x0b,
                        // Unknown escapes pass the byte through unchanged,
                        // which also covers `\"` and `\\`.
                        other => other,
                    });
                }
                other => bytes.push(other),
            }
        }
    }

    /// A number literal terminated by `end` (`>` for pushes, `)` for
    /// duplication counts). The whole literal must match
    /// `[+-]?digits(.digits)?([eE][+-]?digits)?` and fit a finite double.
    fn read_number_literal(&mut self, end: u8) -> ParseResult<f64> {
        let open_loc = self.loc();
        let mut text = String::new();
        loop {
            let Some(byte) = self.reader.next() else {
                return Err(ParseError::new(ParseErrorKind::UnterminatedNumber, open_loc));
            };
            if byte == end {
                break;
            }
            text.push(char::from(byte));
        }
        if !valid_number(&text) {
            return Err(ParseError::new(ParseErrorKind::InvalidNumber(text), open_loc));
        }
        let value: f64 = text.parse().expect("validated number must parse");
        if !value.is_finite() {
            return Err(ParseError::new(ParseErrorKind::InvalidNumber(text), open_loc));
        }
        Ok(value)
    }
}

/// Converts a duplication count literal to a stack index. Negative counts
/// are rejected; fractional counts truncate like the reference's int cast.
fn dup_index(value: f64) -> Option<usize> {
    let truncated = value.trunc();
    if truncated < 0.0 || truncated > usize::MAX as f64 {
        return None;
    }
    Some(truncated as usize)
}

/// Strict number syntax check: `[+-]?digits(.digits)?([eE][+-]?digits)?`.
///
/// Tighter than `f64::from_str`, which also accepts forms like `.5`, `5.`,
/// `inf`, and `nan` that Glass rejects.
fn valid_number(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut pos = 0;

    let digits = |pos: &mut usize| {
        let start = *pos;
        while bytes.get(*pos).is_some_and(u8::is_ascii_digit) {
            *pos += 1;
        }
        *pos > start
    };

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }
    if !digits(&mut pos) {
        return false;
    }
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        if !digits(&mut pos) {
            return false;
        }
    }
    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        if !digits(&mut pos) {
            return false;
        }
    }
    pos == bytes.len()
}
