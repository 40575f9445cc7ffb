use exprcalc::{
    calculate, evaluate, parse, tokenize, Calculator, Config, Error, EvalError, Graph, ParseError,
};
use proptest::prelude::*;

fn assert_value(input: &str, expected: f64) {
    match calculate(input) {
        Ok(value) => assert_eq!(value, expected, "{input}"),
        Err(err) => panic!("{input} failed: {err}"),
    }
}

#[test]
fn precedence_and_grouping() {
    assert_value("2+3*4", 14.0);
    assert_value("(2+3)*4", 20.0);
    assert_value("  2 +\t3 * 4 ", 14.0);
}

#[test]
fn subtraction_is_left_associative() {
    assert_value("8-3-2", 3.0);
}

#[test]
fn postfix_factorial() {
    assert_value("5!", 120.0);
    assert_value("0!", 1.0);
    assert!(matches!(
        calculate("3.5!"),
        Err(Error::Eval(EvalError::FactorialDomain { .. }))
    ));
}

#[test]
fn negative_factorial_cannot_be_written() {
    // There is no unary minus, so the domain error needs a computed operand.
    assert!(matches!(
        calculate("-1!"),
        Err(Error::Parse(ParseError::UnexpectedToken { ref found, .. })) if found == "-"
    ));
    assert!(matches!(
        calculate("(0-1)!"),
        Err(Error::Parse(ParseError::TrailingToken { ref found, .. })) if found == "!"
    ));
}

#[test]
fn function_calls() {
    assert_value("sin(0)", 0.0);
    assert_value("cos(0)", 1.0);
    assert_value("sin((1+1)*0)", 0.0);
}

#[test]
fn division_by_zero_is_infinite() {
    assert_value("1/0", f64::INFINITY);
}

#[test]
fn malformed_input() {
    let cases = [
        ("(1+2", "expected closing parenthesis"),
        ("sin 0)", "expected '(' after function 'sin'"),
        ("sin(0", "expected ')' after function argument"),
        ("2 3", "unexpected token at the end of input: 3"),
        ("2*", "unexpected end of input"),
        ("*2", "unexpected token: *"),
    ];

    for (input, message) in cases {
        match calculate(input) {
            Err(Error::Parse(err)) => assert_eq!(err.to_string(), message, "{input}"),
            other => panic!("{input}: expected a parse error, got {other:?}"),
        }
    }
}

#[test]
fn unknown_character() {
    match calculate("2 * y") {
        Err(Error::Lex(err)) => {
            assert_eq!(err.found, 'y');
            assert_eq!(err.offset, 4);
        }
        other => panic!("expected a lex error, got {other:?}"),
    }
}

#[test]
fn chained_exponent_is_rejected() {
    // `^` applies once per factor pair; the second caret is never consumed.
    match calculate("2^3^2") {
        Err(Error::Parse(ParseError::TrailingToken { found, .. })) => assert_eq!(found, "^"),
        other => panic!("expected a trailing token error, got {other:?}"),
    }
    assert_value("(2^3)^2", 64.0);
    assert_value("2^(3^2)", 512.0);
}

#[test]
fn stages_compose() {
    let tokens = tokenize("cos(0) + 4!").unwrap();
    assert_eq!(tokens.len(), 7);

    let root = parse(&tokens).unwrap();
    assert_eq!(root.to_string(), "(cos(0) + 4!)");
    assert_eq!(evaluate(&root), Ok(25.0));

    let graph = Graph::from_tree(&root);
    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(graph.edges().count(), 4);
}

#[test]
fn configured_limits() {
    let calculator = Calculator::new(Config {
        max_depth: 1,
        max_eval_depth: 8,
    });
    assert_eq!(calculator.calculate("(1+2)"), Ok(3.0));
    assert!(matches!(
        calculator.calculate("((1))"),
        Err(Error::Parse(ParseError::TooDeep { limit: 1, .. }))
    ));

    let long_sum = vec!["1"; 20].join("+");
    assert!(matches!(
        calculator.calculate(&long_sum),
        Err(Error::Eval(EvalError::TooDeep { limit: 8, .. }))
    ));
    assert_value(&long_sum, 20.0);
}

#[test]
fn adversarial_nesting_is_an_error() {
    let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    assert!(matches!(
        calculate(&deep),
        Err(Error::Parse(ParseError::TooDeep { .. }))
    ));

    let bangs = format!("3{}", "!".repeat(10_000));
    assert!(matches!(
        calculate(&bangs),
        Err(Error::Parse(ParseError::TooDeep { .. }))
    ));
}

#[test]
fn long_flat_chain_is_too_deep_not_a_crash() {
    let long_sum = vec!["1"; 200_000].join("+");
    assert!(matches!(
        calculate(&long_sum),
        Err(Error::Eval(EvalError::TooDeep { .. }))
    ));

    let root = Calculator::default().parse(&long_sum).unwrap();
    assert_eq!(root.size(), 399_999);
}

#[test]
fn diagnostics_render_against_source() {
    let source = "(1+2";
    let err = calculate(source).unwrap_err();
    let report = miette::Report::new(err).with_source_code(source.to_string());
    assert_eq!(report.to_string(), "expected closing parenthesis");
}

fn expression_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[0-9]{1,3}",
            "[0-9]{1,2}\\.[0-9]{1,2}",
            Just("+".to_string()),
            Just("-".to_string()),
            Just("*".to_string()),
            Just("/".to_string()),
            Just("^".to_string()),
            Just("!".to_string()),
            Just("(".to_string()),
            Just(")".to_string()),
            Just("sin".to_string()),
            Just("cos".to_string()),
            Just(" ".to_string()),
            Just("x".to_string()),
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn tokenizing_is_idempotent(input in expression_text()) {
        prop_assert_eq!(tokenize(&input), tokenize(&input));
    }

    #[test]
    fn pipeline_never_panics(input in expression_text()) {
        let _ = calculate(&input);
    }

    #[test]
    fn tokens_cover_the_input(input in "[0-9+*/^!() -]{0,32}") {
        let tokens = tokenize(&input).unwrap();
        let rebuilt: String = tokens.iter().map(|t| t.slice).collect();
        let stripped: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(rebuilt, stripped);
    }
}
