use std::collections::BTreeSet;

use framewright::bindings::Bindings;
use framewright::frame::{Column, Dtype, Frame, JoinMode, Value};
use framewright::generate;
use framewright::grammar::Candidate;
use framewright::oracle::Comparison;
use framewright::parallel::{SharedCursor, match_all, match_first};
use framewright::search::Synthesizer;

fn ints(name: &str, values: &[i64]) -> Column {
    let values = values.iter().copied().map(Value::Int).collect();
    Column::new(name, Dtype::Int, values).unwrap()
}

fn setup() -> (Bindings, Frame) {
    let mut bindings = Bindings::new();
    bindings.insert(
        "a",
        Frame::new(vec![ints("x", &[1, 2, 3]), ints("y", &[10, 20, 30])]).unwrap(),
    );
    bindings.insert(
        "b",
        Frame::new(vec![ints("x", &[2, 3, 4]), ints("z", &[200, 300, 400])]).unwrap(),
    );
    let a = bindings.frame("a").unwrap();
    let b = bindings.frame("b").unwrap();
    let target = a.merge(&b, JoinMode::Inner, "x", "x").unwrap();
    (bindings, target)
}

fn sorted(programs: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    programs.into_iter().collect()
}

#[test]
fn shared_cursor_hands_out_each_element_once() {
    let cursor = SharedCursor::new(0..5);
    let mut seen = Vec::new();
    while let Some(n) = cursor.take() {
        seen.push(n);
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(cursor.take(), None);
}

#[test]
fn match_all_is_independent_of_worker_count() {
    let (bindings, target) = setup();
    let single = sorted(match_all(generate::programs(&bindings), &bindings, &target, 1));
    let four = sorted(match_all(generate::programs(&bindings), &bindings, &target, 4));
    let many = sorted(match_all(generate::programs(&bindings), &bindings, &target, 16));
    assert_eq!(single, four);
    assert_eq!(four, many);
    let expected: BTreeSet<String> = std::iter::once(
        "merge(a, b, how=\"inner\", left_on=\"x\", right_on=\"x\")".to_owned(),
    )
    .collect();
    assert_eq!(single, expected);
}

#[test]
fn match_all_agrees_with_the_sequential_policy() {
    let (bindings, target) = setup();
    let parallel = sorted(match_all(generate::programs(&bindings), &bindings, &target, 4));
    let sequential = sorted(
        Synthesizer::new(&bindings, &target)
            .find_all()
            .iter()
            .map(ToString::to_string),
    );
    assert_eq!(parallel, sequential);
}

#[test]
fn match_first_finds_the_unique_program() {
    let (bindings, target) = setup();
    let found = match_first(generate::programs(&bindings), &bindings, &target, 4);
    let found = found.expect("the inner merge reproduces the target");
    assert_eq!(
        found,
        Candidate::Merge {
            left: "a".into(),
            right: "b".into(),
            how: JoinMode::Inner,
            left_on: "x".into(),
            right_on: "x".into(),
        }
    );
    let result = found.interpret(&bindings).unwrap();
    assert!(Comparison::matching().equal(&result, &target));
}

#[test]
fn match_first_exhausts_a_matchless_stream() {
    let mut bindings = Bindings::new();
    bindings.insert(
        "a",
        Frame::new(vec![ints("x", &[1, 2, 3]), ints("y", &[10, 20, 30])]).unwrap(),
    );
    let target = Frame::new(vec![ints("x", &[9, 9, 9]), ints("y", &[9, 9, 9])]).unwrap();
    assert_eq!(match_first(generate::programs(&bindings), &bindings, &target, 4), None);
}

#[test]
fn empty_streams_are_handled() {
    let (bindings, target) = setup();
    assert!(match_all(std::iter::empty(), &bindings, &target, 4).is_empty());
    assert_eq!(match_first(std::iter::empty(), &bindings, &target, 4), None);
}

#[test]
fn zero_workers_still_run_one() {
    let (bindings, target) = setup();
    let found = match_first(generate::programs(&bindings), &bindings, &target, 0);
    assert!(found.is_some());
}
