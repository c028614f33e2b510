//! Minifier and converter properties: round-tripping, renaming, wrapping.

use glass::{Options, Runner};
use pretty_assertions::assert_eq;

fn unoptimized() -> Options {
    Options {
        optimize: false,
        ..Options::default()
    }
}

fn parse(source: &str) -> Runner {
    Runner::from_source(source, "test.glass", &unoptimized()).expect("program should parse")
}

fn parse_bytes(source: &[u8]) -> Runner {
    let text = std::str::from_utf8(source).expect("rendered source is UTF-8 here");
    parse(text)
}

fn run(runner: &Runner) -> Vec<u8> {
    runner.run_collect(Vec::new()).expect("program should run").stdout
}

const COUNTDOWN: &str =
    r"{M[m(_a)A!(_o)O!(c)<3>=/c(c)*(_o)(on).?(c)*<1>(_a)s.?(_a)f.?(c)(1)=,\]}";

#[test]
fn convert_is_a_fixed_point() {
    let first = parse(COUNTDOWN).converted(0);
    let second = parse_bytes(&first).converted(0);
    assert_eq!(first, second);
}

#[test]
fn converted_program_behaves_identically() {
    let original = parse(COUNTDOWN);
    let converted = parse_bytes(&original.converted(0));
    assert_eq!(run(&original), run(&converted));
}

#[test]
fn minified_program_behaves_identically() {
    let source = r#"
        {(Greeter)[(c__)(message)"hello from glass\n"=][(speak)(_out)O!(message)*(_out)o.?]}
        {M[m(_g)(Greeter)!(_g)(speak).?]}
    "#;
    let original = parse(source);
    let minified = original.minified(0);
    let reparsed = parse_bytes(&minified);
    assert_eq!(run(&original), run(&reparsed));
    // Renaming made the program smaller.
    assert!(minified.len() < source.len());
}

#[test]
fn minified_output_keeps_entry_points_and_builtins() {
    let source = r#"{M[m(_handle)O!"x"(_handle)o.?]}"#;
    let minified = String::from_utf8(parse(source).minified(0)).unwrap();
    // `M`, `m`, and the builtin class and method names survive renaming.
    assert!(minified.contains("{M[m"), "got: {minified}");
    assert!(minified.contains('O'), "got: {minified}");
    assert!(minified.contains('o'), "got: {minified}");
    // The verbose local does not.
    assert!(!minified.contains("_handle"), "got: {minified}");
}

#[test]
fn convert_resolves_inheritance() {
    let source = r#"
        {P[(c__)(_o)O!"P"(_o)o.?]}
        {C P [(c__)(_o)O!"C"(_o)o.?]}
        {M[(c__)(_c)(C)!][m]}
    "#;
    let converted = String::from_utf8(parse(source).converted(0)).unwrap();
    // No inheritance header survives; the parent constructor is spliced in
    // under a synthetic method instead.
    assert!(!converted.contains("{C P"), "got: {converted}");
    assert!(converted.contains("(c__P)"), "got: {converted}");

    // And the flattened program still behaves the same.
    let reparsed = parse_bytes(converted.as_bytes());
    assert_eq!(run(&reparsed), b"PC".to_vec());
}

#[test]
fn converted_output_reescapes_strings() {
    let source = r#"{M[m(_o)O!"a\tb\"c\\d\n"(_o)o.?]}"#;
    let converted = String::from_utf8(parse(source).converted(0)).unwrap();
    assert!(converted.contains(r#""a\tb\"c\\d\n""#), "got: {converted}");
}

#[test]
fn width_wraps_between_tokens() {
    let wrapped = parse(COUNTDOWN).converted(16);
    let text = String::from_utf8(wrapped.clone()).unwrap();
    for line in text.lines() {
        assert!(line.len() <= 16, "line too long: {line:?}");
    }
    // Wrapping must not change meaning.
    let reparsed = parse_bytes(&wrapped);
    assert_eq!(run(&parse(COUNTDOWN)), run(&reparsed));
}

#[test]
fn zero_width_means_single_line() {
    let converted = parse(COUNTDOWN).converted(0);
    assert!(!converted.contains(&b'\n'));
}

#[test]
#[should_panic(expected = "without optimization")]
fn rendering_an_optimized_runner_panics() {
    let runner =
        Runner::from_source(COUNTDOWN, "test.glass", &Options::default()).expect("should parse");
    let _ = runner.minified(0);
}
