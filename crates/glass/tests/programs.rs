//! End-to-end programs through the public `Runner` interface.

use glass::{Error, Options, Runner, RuntimeErrorKind};
use pretty_assertions::assert_eq;

/// Parses and runs a program with empty stdin, returning its stdout as text.
fn run(source: &str) -> String {
    let runner =
        Runner::from_source(source, "test.glass", &Options::default()).expect("program should parse");
    let output = runner.run_collect(Vec::new()).expect("program should run");
    String::from_utf8(output.stdout).expect("test programs print UTF-8")
}

/// Runs a program expected to fail at runtime, returning the error.
fn run_err(source: &str) -> Error {
    let runner =
        Runner::from_source(source, "test.glass", &Options::default()).expect("program should parse");
    runner
        .run_collect(Vec::new())
        .expect_err("program should fail at runtime")
}

fn runtime_kind(err: Error) -> RuntimeErrorKind {
    match err {
        Error::Runtime { kind, .. } => kind,
        other => panic!("expected a runtime error, got {other}"),
    }
}

#[test]
fn hello_world() {
    assert_eq!(
        run(r#"{M[m(_o)O!"Hello, world!\n"(_o)o.?]}"#),
        "Hello, world!\n"
    );
}

#[test]
fn arithmetic_two_plus_three_times_four() {
    // (2 + 3) * 4, printed with O.on.
    assert_eq!(
        run("{M[m(_a)A!(_o)O!<2><3>(_a)a.?<4>(_a)m.?(_o)(on).?]}"),
        "20"
    );
}

#[test]
fn loop_countdown() {
    // c = 3; while c: print c; c = floor(c - 1).
    assert_eq!(
        run(r"{M[m(_a)A!(_o)O!(c)<3>=/c(c)*(_o)(on).?(c)*<1>(_a)s.?(_a)f.?(c)(1)=,\]}"),
        "321"
    );
}

#[test]
fn subtraction_order_is_deeper_minus_top() {
    assert_eq!(run("{M[m(_a)A!(_o)O!<2><3>(_a)s.?(_o)(on).?]}"), "-1");
}

#[test]
fn division_and_modulo_order() {
    assert_eq!(run("{M[m(_a)A!(_o)O!<1><4>(_a)d.?(_o)(on).?]}"), "0.25");
    assert_eq!(run("{M[m(_a)A!(_o)O!<7><3>(_a)(mod).?(_o)(on).?]}"), "1");
}

#[test]
fn floor_rounds_down() {
    assert_eq!(run("{M[m(_a)A!(_o)O!<2.75>(_a)f.?(_o)(on).?]}"), "2");
}

#[test]
fn comparisons_compare_deeper_to_top() {
    // 2 < 3
    assert_eq!(run("{M[m(_a)A!(_o)O!<2><3>(_a)(lt).?(_o)(on).?]}"), "1");
    // 2 > 3
    assert_eq!(run("{M[m(_a)A!(_o)O!<2><3>(_a)(gt).?(_o)(on).?]}"), "0");
    // 3 >= 3
    assert_eq!(run("{M[m(_a)A!(_o)O!<3><3>(_a)(ge).?(_o)(on).?]}"), "1");
    // 2 != 3
    assert_eq!(run("{M[m(_a)A!(_o)O!<2><3>(_a)(ne).?(_o)(on).?]}"), "1");
}

#[test]
fn string_builtins() {
    // Length.
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"hello"(_s)l.?(_o)(on).?]}"#), "5");
    // Index.
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"abc"<1>(_s)i.?(_o)o.?]}"#), "b");
    // Out-of-range index yields the empty string.
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"abc"<9>(_s)i.?(_o)o.?]}"#), "");
    // Replacement.
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"abc"<1>"X"(_s)(si).?(_o)o.?]}"#), "aXc");
    // Concatenation keeps stack order, deeper first.
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"ab""cd"(_s)a.?(_o)o.?]}"#), "abcd");
    // Split pushes the prefix first, so the suffix prints before it.
    assert_eq!(
        run(r#"{M[m(_s)S!(_o)O!"hello"<2>(_s)d.?(_o)o.?(_o)o.?]}"#),
        "llohe"
    );
    // Equality.
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"ab""ab"(_s)e.?(_o)(on).?]}"#), "1");
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"ab""ac"(_s)e.?(_o)(on).?]}"#), "0");
    // Byte value to one-character string and back.
    assert_eq!(run("{M[m(_s)S!(_o)O!<65>(_s)(ns).?(_o)o.?]}"), "A");
    assert_eq!(run(r#"{M[m(_s)S!(_o)O!"A"(_s)(sn).?(_o)(on).?]}"#), "65");
}

#[test]
fn string_escapes_round_trip_through_output() {
    assert_eq!(run(r#"{M[m(_o)O!"a\tb\\c\"d"(_o)o.?]}"#), "a\tb\\c\"d");
}

#[test]
fn input_line_appends_newline() {
    let runner = Runner::from_source(
        r"{M[m(_i)I!(_o)O!(_i)l.?(_o)o.?]}",
        "test.glass",
        &Options::default(),
    )
    .unwrap();
    let output = runner.run_collect(&b"hi\nrest"[..]).unwrap();
    assert_eq!(output.stdout, b"hi\n");
}

#[test]
fn input_line_at_eof_is_empty() {
    let runner = Runner::from_source(
        r"{M[m(_i)I!(_o)O!(_i)l.?(_o)o.?]}",
        "test.glass",
        &Options::default(),
    )
    .unwrap();
    let output = runner.run_collect(Vec::new()).unwrap();
    assert_eq!(output.stdout, b"");
}

#[test]
fn input_char_and_eof_flag() {
    let source = r"{M[m(_i)I!(_o)O!(_i)e.?(_o)(on).?(_i)c.?(_o)o.?(_i)e.?(_o)(on).?]}";
    let runner = Runner::from_source(source, "test.glass", &Options::default()).unwrap();
    let output = runner.run_collect(&b"x"[..]).unwrap();
    assert_eq!(output.stdout, b"0x1");
}

#[test]
fn truthiness_drives_loops() {
    // A name value is falsy: the loop body never runs.
    assert_eq!(run(r#"{M[m(_o)O!(x)(y)=/x"T"(_o)o.?(x)<0>=\]}"#), "");
    // An instance value is falsy.
    assert_eq!(run(r#"{M[m(_o)O!(x)(O)!/x"T"(_o)o.?(x)<0>=\]}"#), "");
    // The empty string is falsy, a non-empty string truthy.
    assert_eq!(run(r#"{M[m(_o)O!(x)""=/x"T"(_o)o.?(x)<0>=\]}"#), "");
    assert_eq!(run(r#"{M[m(_o)O!(x)"s"=/x"T"(_o)o.?(x)<0>=\]}"#), "T");
    // Zero is falsy, any other number truthy.
    assert_eq!(run(r#"{M[m(_o)O!(x)<0>=/x"T"(_o)o.?(x)<0>=\]}"#), "");
    assert_eq!(run(r#"{M[m(_o)O!(x)<2>=/x"T"(_o)o.?(x)<0>=\]}"#), "T");
}

#[test]
fn dynamic_variable_lifecycle() {
    // V.n yields a fresh name; storing and reading through it works.
    let source = r"{M[m(_v)V!(_o)O!(_v)n.?(_g)(1)=,(_g)*<7>=(_g)**(_o)(on).?]}";
    assert_eq!(run(source), "7");
}

#[test]
fn dynamic_variable_delete_makes_reads_fail() {
    let source =
        r"{M[m(_v)V!(_g)(_v)n.?=(_g)*<7>=(_g)*(_v)d.?(_g)**]}";
    let kind = runtime_kind(run_err(source));
    assert_eq!(kind, RuntimeErrorKind::Undefined("0".to_owned()));
}

#[test]
fn deleting_a_source_name_is_an_error() {
    let kind = runtime_kind(run_err("{M[m(_v)V!(x)(_v)d.?]}"));
    assert_eq!(kind, RuntimeErrorKind::DeleteNonGenerated("x".to_owned()));
}

#[test]
fn generated_names_count_up_from_zero() {
    // Two V.n calls, store into both, print both.
    let source = r"{M[m(_v)V!(_o)O!(_v)n.?(_a)(1)=,(_v)n.?(_b)(1)=,(_a)*<1>=(_b)*<2>=(_a)**(_o)(on).?(_b)**(_o)(on).?]}";
    assert_eq!(run(source), "12");
}

#[test]
fn constructors_run_on_instantiation() {
    let source = r#"{P[(c__)(_o)O!"born"(_o)o.?]}{M[m(_p)(P)!]}"#;
    assert_eq!(run(source), "born");
}

#[test]
fn assign_self_binds_the_current_object() {
    // The method stores itself into a global, then a later call goes
    // through that binding.
    let source = r#"{W[(c__)(T)$][w(_o)O!"w"(_o)o.?]}{M[m(_w)(W)!(T)w.?]}"#;
    assert_eq!(run(source), "w");
}

#[test]
fn methods_see_fields_of_their_object() {
    let source = r#"{C[(c__)(v)<5>=][p(_o)O!(v)*(_o)(on).?]}{M[m(_c)(C)!(_c)p.?]}"#;
    assert_eq!(run(source), "5");
}

#[test]
fn return_leaves_the_method_early() {
    let source = r#"{M[m(_o)O!"a"(_o)o.?^"b"(_o)o.?]}"#;
    assert_eq!(run(source), "a");
}

#[test]
fn duplicate_stack_element() {
    // Dup the element below the top with the digit shorthand.
    let source = r#"{M[m(_o)O!"x""y"1(_o)o.?(_o)o.?(_o)o.?]}"#;
    assert_eq!(run(source), "xyx");
}

#[test]
fn undefined_name_is_fatal() {
    let kind = runtime_kind(run_err("{M[m(x)*]}"));
    assert_eq!(kind, RuntimeErrorKind::Undefined("x".to_owned()));
}

#[test]
fn empty_stack_pop_is_fatal() {
    let kind = runtime_kind(run_err("{M[m,]}"));
    assert_eq!(kind, RuntimeErrorKind::EmptyStack);
}

#[test]
fn instantiating_an_unknown_class_is_fatal() {
    let kind = runtime_kind(run_err("{M[m(_x)(Z)!]}"));
    assert_eq!(kind, RuntimeErrorKind::UnknownClass("Z".to_owned()));
}

#[test]
fn calling_a_missing_method_is_fatal() {
    let kind = runtime_kind(run_err("{M[m(_o)O!(_o)(zz).?]}"));
    assert_eq!(
        kind,
        RuntimeErrorKind::UnknownMethod {
            object: "_o".to_owned(),
            method: "zz".to_owned(),
        }
    );
}

#[test]
fn executing_a_non_function_is_fatal() {
    let kind = runtime_kind(run_err("{M[m<1>?]}"));
    assert_eq!(kind, RuntimeErrorKind::ExecuteNonFunction);
}

#[test]
fn builtin_type_mismatch_is_fatal() {
    let kind = runtime_kind(run_err(r#"{M[m(_a)A!"x""y"(_a)a.?]}"#));
    assert_eq!(kind, RuntimeErrorKind::BuiltinType(glass::Builtin::MathAdd));
}

#[test]
fn string_replace_bounds_are_checked() {
    let kind = runtime_kind(run_err(r#"{M[m(_s)S!"abc"<9>"X"(_s)(si).?]}"#));
    assert_eq!(
        kind,
        RuntimeErrorKind::StringIndexOutOfRange { index: 9, len: 3 }
    );

    let kind = runtime_kind(run_err(r#"{M[m(_s)S!"abc"<1>"XY"(_s)(si).?]}"#));
    assert_eq!(kind, RuntimeErrorKind::ReplacementNotOneByte { len: 2 });
}

#[test]
fn out_of_range_duplication_is_fatal() {
    let kind = runtime_kind(run_err("{M[m<1>3]}"));
    assert_eq!(kind, RuntimeErrorKind::DupOutOfRange { index: 3 });
}

#[test]
fn missing_main_class_is_fatal() {
    let kind = runtime_kind(run_err("{X[m]}"));
    assert_eq!(kind, RuntimeErrorKind::MissingMainClass);
}

#[test]
fn missing_main_method_is_fatal() {
    let kind = runtime_kind(run_err("{M[x]}"));
    assert_eq!(kind, RuntimeErrorKind::MissingMainMethod);
}

#[test]
fn unbounded_recursion_hits_the_depth_cap() {
    // m calls itself through the _Main-style self binding.
    let source = "{M[m(_t)$(_t)m.?]}";
    let kind = runtime_kind(run_err(source));
    assert_eq!(kind, RuntimeErrorKind::CallDepthExceeded);
}

#[test]
fn runtime_errors_carry_source_positions() {
    let err = run_err("{M[m\n  (x)*]}");
    let Error::Runtime { pos, .. } = err else {
        panic!("expected runtime error");
    };
    assert_eq!(pos.file, "test.glass");
    assert_eq!(pos.line, 2);
    // The `*` opcode raised the lookup failure.
    assert_eq!(pos.col, 6);
}

#[test]
fn comments_are_whitespace() {
    assert_eq!(
        run("{M'main class'[m(_o)'out'O!\"ok\"(_o)o.?]}"),
        "ok"
    );
}
