//! Public interface for loading and running Glass programs.
//!
//! A [`Runner`] owns a fully parsed, linked, and (optionally) optimized
//! program. It is immutable once built: every `run_*` call executes against
//! fresh runtime state, so one `Runner` can be reused across runs and
//! tests can exercise several executions in one process.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    classes, minify, optimize, parse,
    code::SourceLoc,
    classes::ClassMap,
    error::Error,
    heap::HeapStats,
    intern::Interns,
    io::{CollectOutput, InputReader, OutputWriter, SliceInput, StdInput, StdOutput},
    vm::Interpreter,
};

/// Knobs for program construction, mirroring the CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Reject the non-standard extensions (inheritance headers and include
    /// strings) at parse time.
    pub pedantic: bool,
    /// Run the peephole optimizer after linking. Must be off for a runner
    /// whose program will be rendered back to source.
    pub optimize: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pedantic: false,
            optimize: true,
        }
    }
}

/// A linked program: the class map plus the position used for diagnostics
/// that predate any executing opcode (a missing `M`, for example).
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Program {
    pub classes: ClassMap,
    pub main_loc: SourceLoc,
}

/// Captured result of a test-friendly run.
#[derive(Debug)]
pub struct RunOutput {
    /// Everything the program wrote through `O.o`/`O.on`.
    pub stdout: Vec<u8>,
    /// Arena counters at the end of the run.
    pub heap: HeapStats,
}

/// A parsed and linked Glass program, ready to execute.
#[derive(Debug, Serialize, Deserialize)]
pub struct Runner {
    program: Program,
    interns: Interns,
    optimized: bool,
}

impl Runner {
    /// Parses, links, and prepares a program from an in-memory source.
    ///
    /// Include strings in the source resolve relative to the current
    /// directory, since an in-memory source has no directory of its own.
    pub fn from_source(source: &str, file_name: &str, options: &Options) -> Result<Self, Error> {
        let mut interns = Interns::new();
        let (classes, root) =
            parse::parse_source(source.as_bytes(), file_name, options.pedantic, &mut interns)?;
        Self::finish(classes, root_loc(root), interns, options)
    }

    /// Parses, links, and prepares a program from a file on disk.
    pub fn from_file(path: impl AsRef<Path>, options: &Options) -> Result<Self, Error> {
        let mut interns = Interns::new();
        let (classes, root) = parse::parse_path(path.as_ref(), options.pedantic, &mut interns)?;
        Self::finish(classes, root_loc(root), interns, options)
    }

    fn finish(
        mut classes: ClassMap,
        main_loc: SourceLoc,
        mut interns: Interns,
        options: &Options,
    ) -> Result<Self, Error> {
        classes::link(&mut classes, &mut interns).map_err(|err| Error::link(err, &interns))?;
        if options.optimize {
            optimize::optimize_classes(&mut classes);
        }
        Ok(Self {
            program: Program { classes, main_loc },
            interns,
            optimized: options.optimize,
        })
    }

    /// Runs the program against process stdin/stdout.
    pub fn run(&self) -> Result<(), Error> {
        let mut output = StdOutput::new();
        let mut input = StdInput::new();
        self.run_with(&mut output, &mut input)?;
        Ok(())
    }

    /// Runs the program against the given I/O endpoints, returning the
    /// arena counters observed at the end of the run.
    pub fn run_with(
        &self,
        output: &mut impl OutputWriter,
        input: &mut impl InputReader,
    ) -> Result<HeapStats, Error> {
        // `V.n` interns fresh dynamic names at runtime, so each run works
        // on its own copy of the interner and the runner stays reusable.
        let mut interns = self.interns.clone();
        let (result, stats) = {
            let mut interp = Interpreter::new(&self.program, &mut interns, output, input);
            let result = interp.run();
            (result, interp.heap_stats())
        };
        result.map_err(|err| Error::runtime(err, &interns))?;
        Ok(stats)
    }

    /// Runs with captured output and the given bytes as standard input.
    pub fn run_collect(&self, input: impl Into<Vec<u8>>) -> Result<RunOutput, Error> {
        let mut output = CollectOutput::new();
        let mut reader = SliceInput::new(input);
        let heap = self.run_with(&mut output, &mut reader)?;
        Ok(RunOutput {
            stdout: output.into_output(),
            heap,
        })
    }

    /// Renders the program minified: identifiers renamed to the shortest
    /// free spellings, builtins and entry points kept stable.
    ///
    /// `width` wraps the output at token boundaries (`0` disables).
    ///
    /// # Panics
    /// Panics if the runner was built with the optimizer on; fused opcodes
    /// have no source rendering. Build with
    /// `Options { optimize: false, .. }`.
    #[must_use]
    pub fn minified(&self, width: usize) -> Vec<u8> {
        assert!(
            !self.optimized,
            "minification requires a runner built without optimization"
        );
        minify::render(&self.program.classes, &self.interns, true, width)
    }

    /// Renders the program as standards-compliant Glass with its original
    /// identifiers: includes are already flattened and inheritance already
    /// resolved, so the output uses no non-standard extensions.
    ///
    /// # Panics
    /// As for [`Self::minified`].
    #[must_use]
    pub fn converted(&self, width: usize) -> Vec<u8> {
        assert!(
            !self.optimized,
            "conversion requires a runner built without optimization"
        );
        minify::render(&self.program.classes, &self.interns, false, width)
    }

    /// Serializes the runner to a compact binary form.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a runner serialized with [`Self::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

fn root_loc(file: crate::intern::FileId) -> SourceLoc {
    SourceLoc {
        file,
        line: 1,
        col: 1,
    }
}
