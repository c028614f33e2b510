//! String and file-name interning for identifiers and source positions.
//!
//! Glass programs mention the same handful of names over and over (every
//! variable access, method call, and class reference goes through a name), so
//! identifiers are stored once in an [`Interns`] table and referenced by
//! [`StringId`] everywhere else. Lookups back to text are only needed for
//! error messages and for rendering source with the minifier.
//!
//! The first few ids are reserved for names the runtime itself needs: the
//! constructor and destructor method names, the `_t` self-temporary used by
//! the inheritance linker, the `M`/`m` entry points, and the `_Main` global
//! the interpreter roots the main object under.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Index into the interner's string storage.
///
/// Uses `u32` to keep the id (and everything embedding it) small; four
/// billion distinct identifiers is far beyond any real program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the interner's file-name storage.
///
/// A `u16` bounds the number of distinct source files at 65 536, which is
/// generous for a language whose include mechanism is a flat file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct FileId(u16);

impl FileId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Names known to the runtime, interned ahead of everything else so their
/// ids are compile-time constants.
const WELL_KNOWN: [&str; 6] = ["c__", "d__", "_t", "M", "m", "_Main"];

/// Interning table for identifier strings and source file names.
///
/// Populated during parsing and linking; the interpreter appends to it at
/// runtime only when `V.n` generates a fresh dynamic name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "InternsSnapshot", into = "InternsSnapshot")]
pub(crate) struct Interns {
    strings: Vec<Box<str>>,
    /// Reverse index from text to id. Rebuilt on deserialization rather
    /// than stored, since it is fully derived from `strings`.
    ids: AHashMap<Box<str>, StringId>,
    files: Vec<Box<str>>,
}

impl Interns {
    /// The constructor method name, `c__`.
    ///
    /// `d__` (the destructor name, id 1) is interned alongside it so the
    /// minifier's reserved set always resolves, but the runtime never
    /// invokes destructors and needs no constant for it.
    pub const CTOR: StringId = StringId(0);
    /// The `_t` local the inheritance linker binds the new object to.
    pub const SELF_TMP: StringId = StringId(2);
    /// The main class name, `M`.
    pub const MAIN_CLASS: StringId = StringId(3);
    /// The main method name, `m`.
    pub const MAIN_METHOD: StringId = StringId(4);
    /// The `_Main` global binding that roots the main object.
    pub const MAIN_BINDING: StringId = StringId(5);

    pub fn new() -> Self {
        let mut interns = Self {
            strings: Vec::new(),
            ids: AHashMap::new(),
            files: Vec::new(),
        };
        for name in WELL_KNOWN {
            interns.intern(name);
        }
        interns
    }

    /// Interns a string, returning the existing id if it was seen before.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("interner overflow"));
        self.strings.push(text.into());
        self.ids.insert(text.into(), id);
        id
    }

    /// Looks up a previously interned string without inserting.
    pub fn lookup(&self, text: &str) -> Option<StringId> {
        self.ids.get(text).copied()
    }

    /// Returns the text of an interned string.
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Registers a source file name and returns its id.
    pub fn add_file(&mut self, name: &str) -> FileId {
        let id = FileId(u16::try_from(self.files.len()).expect("too many source files"));
        self.files.push(name.into());
        id
    }

    /// Returns the name of a registered source file.
    pub fn file_name(&self, id: FileId) -> &str {
        &self.files[id.index()]
    }
}

impl Default for Interns {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized form of [`Interns`]: just the two vectors, with the reverse
/// index rebuilt on load.
#[derive(Serialize, Deserialize)]
struct InternsSnapshot {
    strings: Vec<Box<str>>,
    files: Vec<Box<str>>,
}

impl From<InternsSnapshot> for Interns {
    fn from(snapshot: InternsSnapshot) -> Self {
        let ids = snapshot
            .strings
            .iter()
            .enumerate()
            .map(|(index, text)| (text.clone(), StringId(index as u32)))
            .collect();
        Self {
            strings: snapshot.strings,
            ids,
            files: snapshot.files,
        }
    }
}

impl From<Interns> for InternsSnapshot {
    fn from(interns: Interns) -> Self {
        Self {
            strings: interns.strings,
            files: interns.files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ids_are_stable() {
        let interns = Interns::new();
        assert_eq!(interns.get(Interns::CTOR), "c__");
        assert_eq!(interns.get(Interns::SELF_TMP), "_t");
        assert_eq!(interns.get(Interns::MAIN_CLASS), "M");
        assert_eq!(interns.get(Interns::MAIN_METHOD), "m");
        assert_eq!(interns.get(Interns::MAIN_BINDING), "_Main");
        assert_eq!(interns.lookup("d__"), Some(StringId(1)));
    }

    #[test]
    fn interning_is_idempotent() {
        let mut interns = Interns::new();
        let first = interns.intern("counter");
        let second = interns.intern("counter");
        assert_eq!(first, second);
        assert_eq!(interns.get(first), "counter");
    }

    #[test]
    fn snapshot_round_trip_rebuilds_reverse_index() {
        let mut interns = Interns::new();
        interns.intern("abc");
        interns.add_file("main.glass");
        let bytes = postcard::to_allocvec(&interns).unwrap();
        let mut restored: Interns = postcard::from_bytes(&bytes).unwrap();
        let id = restored.lookup("abc").unwrap();
        assert_eq!(restored.intern("abc"), id);
        assert_eq!(restored.file_name(FileId(0)), "main.glass");
    }
}
