//! Crest curve formulas
//!
//! A formula is a single-variable arithmetic expression over the frequency
//! `f` (Hz). It is parsed into a small expression tree and evaluated at a
//! fixed set of reference frequencies to produce a [`CrestCurve`]. Evaluation
//! is pure: the tree can only reference `f`, numeric literals, `pi` and a
//! closed set of math functions.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, map, recognize},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::curve::{CrestCurve, CrestCurvePoint, MAX_CREST_DB, MIN_CREST_DB};

/// Frequencies (Hz) at which a formula is sampled to build a curve
pub const REFERENCE_FREQUENCIES: [f64; 11] = [
    10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0,
];

/// Longest accepted formula source, in bytes
pub const MAX_FORMULA_LEN: usize = 256;

/// Deepest accepted parenthesis nesting
pub const MAX_NESTING: usize = 32;

/// Formula rejection reasons. A rejected formula never replaces a curve.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("formula could not be parsed near `{near}`")]
    Parse { near: String },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{name}` expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("formula is {len} bytes long, limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("formula nests deeper than {max} levels")]
    TooDeep { max: usize },
    #[error("formula is not finite at {frequency} Hz (value {value})")]
    NonFinite { frequency: f64, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Log10,
    Ln,
    Sqrt,
    Abs,
    Pow,
    Sin,
    Cos,
    Exp,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "log10" => Func::Log10,
            // natural logarithm, matching `ln`
            "log" | "ln" => Func::Ln,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "pow" => Func::Pow,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "exp" => Func::Exp,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Pow => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Func::Log10 => x.log10(),
            Func::Ln => x.ln(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Pow => x.powf(args[1]),
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Exp => x.exp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Freq,
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    fn eval(&self, f: f64) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Freq => f,
            Expr::Neg(e) => -e.eval(f),
            Expr::Add(a, b) => a.eval(f) + b.eval(f),
            Expr::Sub(a, b) => a.eval(f) - b.eval(f),
            Expr::Mul(a, b) => a.eval(f) * b.eval(f),
            Expr::Div(a, b) => a.eval(f) / b.eval(f),
            Expr::Pow(a, b) => a.eval(f).powf(b.eval(f)),
            Expr::Call(func, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(f)).collect();
                func.apply(&values)
            }
        }
    }
}

// Identifiers are resolved after parsing so unknown names and bad arity
// produce specific errors rather than a generic parse failure.
#[derive(Debug, Clone, PartialEq)]
enum Raw {
    Number(f64),
    Ident(String),
    Call(String, Vec<Raw>),
    Neg(Box<Raw>),
    Binary(char, Box<Raw>, Box<Raw>),
}

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Raw> {
    // reject a leading sign here so unary minus stays an operator
    let first = input.chars().next();
    if !matches!(first, Some(c) if c.is_ascii_digit() || c == '.') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        )));
    }
    map(double, Raw::Number)(input)
}

fn call_or_ident(input: &str) -> IResult<&str, Raw> {
    let (input, name) = identifier(input)?;
    let args: IResult<&str, Vec<Raw>> = delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), expr),
        ws(char(')')),
    )(input);
    match args {
        Ok((rest, args)) => Ok((rest, Raw::Call(name.to_string(), args))),
        Err(_) => Ok((input, Raw::Ident(name.to_string()))),
    }
}

fn atom(input: &str) -> IResult<&str, Raw> {
    ws(alt((
        number,
        call_or_ident,
        delimited(char('('), expr, char(')')),
    )))(input)
}

fn power(input: &str) -> IResult<&str, Raw> {
    let (input, base) = atom(input)?;
    let exponent: IResult<&str, Raw> = preceded(ws(char('^')), unary)(input);
    match exponent {
        Ok((rest, exp)) => Ok((rest, Raw::Binary('^', Box::new(base), Box::new(exp)))),
        Err(_) => Ok((input, base)),
    }
}

fn unary(input: &str) -> IResult<&str, Raw> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Raw::Neg(Box::new(e))),
        preceded(ws(char('+')), unary),
        power,
    ))(input)
}

fn fold_binary(first: Raw, rest: Vec<(char, Raw)>) -> Raw {
    rest.into_iter().fold(first, |acc, (op, rhs)| {
        Raw::Binary(op, Box::new(acc), Box::new(rhs))
    })
}

fn term(input: &str) -> IResult<&str, Raw> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(tuple((ws(alt((char('*'), char('/')))), unary)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn expr(input: &str) -> IResult<&str, Raw> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(tuple((ws(alt((char('+'), char('-')))), term)))(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn resolve(raw: Raw) -> Result<Expr, FormulaError> {
    Ok(match raw {
        Raw::Number(n) => Expr::Number(n),
        Raw::Ident(name) => match name.as_str() {
            "f" => Expr::Freq,
            "pi" => Expr::Number(std::f64::consts::PI),
            _ => return Err(FormulaError::UnknownFunction(name)),
        },
        Raw::Neg(inner) => Expr::Neg(Box::new(resolve(*inner)?)),
        Raw::Binary(op, a, b) => {
            let (a, b) = (Box::new(resolve(*a)?), Box::new(resolve(*b)?));
            match op {
                '+' => Expr::Add(a, b),
                '-' => Expr::Sub(a, b),
                '*' => Expr::Mul(a, b),
                '/' => Expr::Div(a, b),
                _ => Expr::Pow(a, b),
            }
        }
        Raw::Call(name, args) => {
            let func =
                Func::lookup(&name).ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
            if args.len() != func.arity() {
                return Err(FormulaError::Arity {
                    name,
                    expected: func.arity(),
                    got: args.len(),
                });
            }
            Expr::Call(
                func,
                args.into_iter().map(resolve).collect::<Result<_, _>>()?,
            )
        }
    })
}

// The parser and the evaluator both recurse per nesting level.
fn check_nesting(source: &str) -> Result<(), FormulaError> {
    let mut depth = 0usize;
    for c in source.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(FormulaError::TooDeep { max: MAX_NESTING });
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// A parsed crest formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(FormulaError::Empty);
        }
        if trimmed.len() > MAX_FORMULA_LEN {
            return Err(FormulaError::TooLong {
                len: trimmed.len(),
                max: MAX_FORMULA_LEN,
            });
        }
        check_nesting(trimmed)?;
        let (_, raw) = all_consuming(expr)(trimmed).map_err(|e| {
            let near = match e {
                nom::Err::Error(err) | nom::Err::Failure(err) => err.input.to_string(),
                nom::Err::Incomplete(_) => String::new(),
            };
            FormulaError::Parse { near }
        })?;
        Ok(Self {
            source: trimmed.to_string(),
            expr: resolve(raw)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate at `frequency`, rejecting NaN and infinite results
    pub fn evaluate(&self, frequency: f64) -> Result<f64, FormulaError> {
        let value = self.expr.eval(frequency);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite { frequency, value })
        }
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A contiguous run of reference frequencies whose raw value fell outside 0-20 dB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeWarning {
    pub from_hz: f64,
    pub to_hz: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "crest out of range ({:.1}..{:.1} dB) between {} Hz and {} Hz, clamped to {}-{} dB",
            self.min_value, self.max_value, self.from_hz, self.to_hz, MIN_CREST_DB, MAX_CREST_DB
        )
    }
}

/// Curve produced from a formula, with any clamping that was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaCurve {
    pub formula: String,
    pub curve: CrestCurve,
    pub warnings: Vec<RangeWarning>,
}

impl FormulaCurve {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Evaluate `formula` at the reference frequencies and build a clamped curve
pub fn curve_from_formula(formula: &Formula) -> Result<FormulaCurve, FormulaError> {
    let mut points = Vec::with_capacity(REFERENCE_FREQUENCIES.len());
    let mut warnings: Vec<RangeWarning> = Vec::new();
    let mut run_open = false;

    for &frequency in REFERENCE_FREQUENCIES.iter() {
        let raw = formula.evaluate(frequency)?;
        let out_of_range = !(MIN_CREST_DB..=MAX_CREST_DB).contains(&raw);

        if out_of_range {
            match warnings.last_mut() {
                Some(w) if run_open => {
                    w.to_hz = frequency;
                    w.min_value = w.min_value.min(raw);
                    w.max_value = w.max_value.max(raw);
                }
                _ => warnings.push(RangeWarning {
                    from_hz: frequency,
                    to_hz: frequency,
                    min_value: raw,
                    max_value: raw,
                }),
            }
        }
        run_open = out_of_range;

        let crest = round_tenth(raw.clamp(MIN_CREST_DB, MAX_CREST_DB));
        points.push(CrestCurvePoint::new(frequency, crest));
    }

    Ok(FormulaCurve {
        formula: formula.source().to_string(),
        curve: points.into(),
        warnings,
    })
}

/// Parse and evaluate in one step
pub fn parse_curve(source: &str) -> Result<FormulaCurve, FormulaError> {
    curve_from_formula(&Formula::parse(source)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn eval(src: &str, f: f64) -> f64 {
        Formula::parse(src).unwrap().evaluate(f).unwrap()
    }

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("2 ^ 3 ^ 2", 512.0)]
    #[case("-2 ^ 2", -4.0)]
    #[case("2 ^ -1", 0.5)]
    #[case("10 - 4 - 3", 3.0)]
    #[case("8 / 4 / 2", 1.0)]
    #[case("pow(2, 10)", 1024.0)]
    #[case("abs(-3.5)", 3.5)]
    #[case("sqrt(16)", 4.0)]
    #[case("ln(exp(2))", 2.0)]
    #[case("log(exp(1))", 1.0)]
    #[case("1e1 + .5", 10.5)]
    fn test_arithmetic(#[case] src: &str, #[case] expected: f64) {
        assert!((eval(src, 0.0) - expected).abs() < 1e-9, "{src}");
    }

    #[test]
    fn test_frequency_variable() {
        assert!((eval("6 + 2 * log10(f / 100)", 1000.0) - 8.0).abs() < 1e-9);
        assert!((eval("sin(pi / 2) * f", 3.0) - 3.0).abs() < 1e-9);
        assert!((eval("cos(0) + f", 1.0) - 2.0).abs() < 1e-9);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_empty_rejected(#[case] src: &str) {
        assert_eq!(Formula::parse(src), Err(FormulaError::Empty));
    }

    #[rstest]
    #[case("1 +")]
    #[case("(1 + 2")]
    #[case("f f")]
    #[case("3 $ 4")]
    fn test_parse_errors(#[case] src: &str) {
        assert!(matches!(Formula::parse(src), Err(FormulaError::Parse { .. })), "{src}");
    }

    #[test]
    fn test_oversized_formulas_rejected() {
        let unary = format!("{}f", "-".repeat(8000));
        assert!(matches!(parse_curve(&unary), Err(FormulaError::TooLong { len: 8001, .. })));

        let chain = vec!["f"; 5000].join("+");
        assert!(matches!(Formula::parse(&chain), Err(FormulaError::TooLong { .. })));

        let nested = format!("{}f{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(
            Formula::parse(&nested),
            Err(FormulaError::TooDeep { max: MAX_NESTING })
        );

        let deepest = format!("{}f{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!((eval(&deepest, 3.0) - 3.0).abs() < 1e-12);
        let signs = format!("{}f", "-".repeat(MAX_FORMULA_LEN - 1));
        assert!(Formula::parse(&signs).is_ok());
    }

    #[test]
    fn test_unknown_identifiers_rejected() {
        assert_eq!(
            Formula::parse("tan(f)"),
            Err(FormulaError::UnknownFunction("tan".into()))
        );
        assert_eq!(
            Formula::parse("x + 1"),
            Err(FormulaError::UnknownFunction("x".into()))
        );
    }

    #[test]
    fn test_arity_checked() {
        assert!(matches!(
            Formula::parse("pow(2)"),
            Err(FormulaError::Arity { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let formula = Formula::parse("1 / (f - 100)").unwrap();
        assert!(matches!(
            curve_from_formula(&formula),
            Err(FormulaError::NonFinite { frequency, .. }) if frequency == 100.0
        ));
        assert!(matches!(
            parse_curve("log10(f - 1000)"),
            Err(FormulaError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_curve_uses_reference_frequencies() {
        let result = parse_curve("6 + 2 * log10(f / 10)").unwrap();
        let freqs: Vec<f64> = result.curve.points().iter().map(|p| p.frequency).collect();
        assert_eq!(freqs, REFERENCE_FREQUENCIES.to_vec());
        assert!(result.is_clean());
        // rounded to one decimal
        assert_eq!(result.curve.points()[1].crest_factor, 6.6);
    }

    #[test]
    fn test_out_of_range_is_clamped_and_reported() {
        // 10 Hz -> -2, 20000 Hz -> ~21.2
        let result = parse_curve("-2 + 7 * log10(f / 10)").unwrap();
        assert_eq!(result.curve.points()[0].crest_factor, 0.0);
        assert_eq!(result.curve.points()[10].crest_factor, 20.0);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].from_hz, 10.0);
        assert_eq!(result.warnings[0].to_hz, 10.0);
        assert_eq!(result.warnings[1].to_hz, 20000.0);
        assert!(result.warnings[1].max_value > 20.0);
    }

    #[test]
    fn test_adjacent_out_of_range_frequencies_merge() {
        let result = parse_curve("25").unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].from_hz, 10.0);
        assert_eq!(result.warnings[0].to_hz, 20000.0);
        assert!(result.warnings[0].to_string().contains("clamped"));
    }
}
