//! Snapshot round-trips through `Runner::dump`/`Runner::load`.

use glass::{Options, Runner};
use pretty_assertions::assert_eq;

const PROGRAM: &str = r#"
    {P[(c__)(_o)O!"P"(_o)o.?]}
    {C P [(c__)(_o)O!"C"(_o)o.?]}
    {M[m(_c)(C)!]}
"#;

#[test]
fn restored_runner_behaves_identically() {
    let original =
        Runner::from_source(PROGRAM, "test.glass", &Options::default()).expect("should parse");
    let bytes = original.dump().expect("should serialize");
    let restored = Runner::load(&bytes).expect("should deserialize");

    let before = original.run_collect(Vec::new()).expect("original run");
    let after = restored.run_collect(Vec::new()).expect("restored run");
    assert_eq!(before.stdout, after.stdout);
    assert_eq!(before.stdout, b"PC".to_vec());
}

#[test]
fn restored_runner_renders_identically() {
    let options = Options {
        optimize: false,
        ..Options::default()
    };
    let original = Runner::from_source(PROGRAM, "test.glass", &options).expect("should parse");
    let restored = Runner::load(&original.dump().unwrap()).expect("should deserialize");
    assert_eq!(original.converted(0), restored.converted(0));
    assert_eq!(original.minified(40), restored.minified(40));
}

#[test]
fn errors_keep_positions_after_restore() {
    let original = Runner::from_source("{M[m(x)*]}", "test.glass", &Options::default())
        .expect("should parse");
    let restored = Runner::load(&original.dump().unwrap()).expect("should deserialize");
    let err = restored
        .run_collect(Vec::new())
        .expect_err("undefined name should fail");
    let glass::Error::Runtime { pos, .. } = err else {
        panic!("expected runtime error");
    };
    assert_eq!(pos.file, "test.glass");
    assert_eq!((pos.line, pos.col), (1, 8));
}
