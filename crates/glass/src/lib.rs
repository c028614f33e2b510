#![doc = include_str!("../../../README.md")]

mod builtins;
mod classes;
mod code;
mod error;
mod heap;
mod intern;
mod io;
mod minify;
mod optimize;
mod parse;
mod reader;
mod run;
mod value;
mod vm;

pub use crate::{
    builtins::Builtin,
    error::{Error, LinkErrorKind, ParseErrorKind, RuntimeErrorKind, SourcePos},
    heap::HeapStats,
    io::{CollectOutput, InputReader, NoOutput, OutputWriter, SliceInput, StdInput, StdOutput},
    run::{Options, RunOutput, Runner},
};
