//! End-to-end evaluation of Molang source

use cosmetic_molang::{Expression, Runtime, SimpleRuntime, parse};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn eval(source: &str) -> f32 {
    let mut runtime = SimpleRuntime::new(1);
    Expression::parse(source).unwrap().eval(&mut runtime)
}

#[test_case("1 + 2 * 3", 7.0; "precedence")]
#[test_case("(1 + 2) * 3", 9.0; "parentheses")]
#[test_case("10 - 4 - 3", 3.0; "left associative subtraction")]
#[test_case("-2 * -3", 6.0; "unary minus")]
#[test_case("!0 + !5", 1.0; "logical not")]
#[test_case("1 < 2 && 3 >= 3", 1.0; "comparison and")]
#[test_case("0 || 0", 0.0; "or false")]
#[test_case("2 == 2 ? 10 : 20", 10.0; "ternary true")]
#[test_case("0 ? 10 : 20", 20.0; "ternary false")]
#[test_case("0 ? 10", 0.0; "binary conditional falls through")]
#[test_case("true + false", 1.0; "boolean literals")]
#[test_case("Math.Abs(-4)", 4.0; "case insensitive")]
#[test_case("math.pi > 3.14 && math.pi < 3.15", 1.0; "pi")]
#[test_case("", 0.0; "empty source")]
fn test_simple_expressions(source: &str, expected: f32) {
    assert_eq!(eval(source), expected);
}

#[test]
fn test_complex_program_returns_value() {
    assert_eq!(eval("t.a = 2; t.b = t.a * 3; return t.b + 1;"), 7.0);
    assert_eq!(eval("t.a = 2;"), 0.0);
}

#[test]
fn test_loop_accumulates() {
    assert_eq!(
        eval("t.n = 0; loop(4, { t.n = t.n + 2; }); return t.n;"),
        8.0
    );
}

#[test]
fn test_return_from_inside_loop() {
    assert_eq!(
        eval("t.i = 0; loop(100, { t.i = t.i + 1; t.i >= 7 ? return t.i; }); return -1;"),
        7.0
    );
}

#[test]
fn test_coalesce_prefers_defined_value() {
    let expr = Expression::parse("v.speed ?? 3").unwrap();
    let mut runtime = SimpleRuntime::default();
    assert_eq!(expr.eval(&mut runtime), 3.0);
    runtime.set_variable("speed", 0.0);
    assert_eq!(expr.eval(&mut runtime), 0.0);
}

#[test]
fn test_variables_survive_between_evaluations() {
    let counter = Expression::parse("v.count = (v.count ?? 0) + 1").unwrap();
    let mut runtime = SimpleRuntime::default();
    for _ in 0..3 {
        counter.eval(&mut runtime);
    }
    assert_eq!(runtime.variables.get("count"), Some(3.0));
}

#[test]
fn test_long_and_short_namespaces_alias() {
    let mut runtime = SimpleRuntime::default();
    Expression::parse("variable.size = 4")
        .unwrap()
        .eval(&mut runtime);
    assert_eq!(Expression::parse("v.size").unwrap().eval(&mut runtime), 4.0);
}

#[test]
fn test_queries_receive_arguments() {
    struct Doubler;
    impl Runtime for Doubler {
        fn variable(&mut self, _name: &str) -> Option<f32> {
            None
        }
        fn set_variable(&mut self, _name: &str, _value: f32) {}
        fn query(&mut self, name: &str, args: &[f32]) -> Option<f32> {
            (name == "double").then(|| args.first().copied().unwrap_or(0.0) * 2.0)
        }
        fn random(&mut self) -> f32 {
            0.0
        }
    }

    let expr = Expression::parse("q.double(3) + query.unknown").unwrap();
    assert_eq!(expr.eval(&mut Doubler), 6.0);
}

#[test]
fn test_random_is_seeded_and_bounded() {
    let expr = Expression::parse("math.random(2, 4)").unwrap();
    let mut a = SimpleRuntime::new(42);
    let mut b = SimpleRuntime::new(42);
    for _ in 0..100 {
        let x = expr.eval(&mut a);
        assert!((2.0..=4.0).contains(&x));
        assert_eq!(x, expr.eval(&mut b));
    }
}

#[test]
fn test_parse_errors_are_reported() {
    assert!(parse("1 +").is_err());
    assert!(parse("math.nope(1)").is_err());
    assert!(parse("v.a = ").is_err());
    assert!(parse("{ 1; ").is_err());
}
