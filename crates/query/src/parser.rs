//! A `nom`-based parser for the MQL query language.
use crate::ast::{CompareOp, Expr, PathExpression, PathSegment, Pattern, SampleConfig, SelectItem, Statement};
use crate::error::ParseError;
use mql_types::Value;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{alpha1, char, digit1, multispace0, one_of, satisfy},
    combinator::{cut, map, map_res, not, opt, recognize, value, verify},
    error::{ContextError, ErrorKind, FromExternalError, ParseError as NomParseError, context},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use regex::RegexBuilder;
use std::borrow::Cow;
use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;

/// Parser-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Upper bound on the compiled size of a regex literal, in bytes.
    pub regex_size_limit: usize,
    /// Deepest allowed stack of parentheses and negations in a `where` clause.
    pub max_nesting: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            regex_size_limit: 1 << 20,
            max_nesting: 64,
        }
    }
}

// --- Main Public Parser ---

pub fn parse(text: &str) -> Result<Statement, ParseError> {
    parse_with(text, &ParseOptions::default())
}

pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Statement, ParseError> {
    let grammar = Grammar {
        options,
        depth: Cell::new(0),
    };
    match grammar.statement(text) {
        Ok(("", statement)) => Ok(statement),
        Ok((rest, _)) => Err(to_parse_error(text, SyntaxError::expected(rest, "end of query"))),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(to_parse_error(text, e)),
        Err(nom::Err::Incomplete(_)) => Err(to_parse_error(text, SyntaxError::expected("", "complete query"))),
    }
}

fn to_parse_error(text: &str, error: SyntaxError<'_>) -> ParseError {
    let rest = error.input.trim_start();
    let mut expected = error
        .expected
        .map(Cow::into_owned)
        .unwrap_or_else(|| "valid query syntax".to_string());
    if let Some(detail) = error.detail {
        expected = format!("{} ({})", expected, detail);
    }
    ParseError {
        position: text.len().saturating_sub(rest.len()),
        expected,
        found: describe(rest),
    }
}

fn describe(rest: &str) -> String {
    match rest.chars().next() {
        None => "end of input".to_string(),
        Some(c) if is_ident_char(c) => {
            let word: String = rest.chars().take_while(|c| is_ident_char(*c)).collect();
            format!("'{}'", word)
        }
        Some(c) => format!("'{}'", c),
    }
}

// --- Error type ---

type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

/// The parser's internal error: where it stopped and what it wanted there.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError<'a> {
    input: &'a str,
    expected: Option<Cow<'static, str>>,
    detail: Option<String>,
}

impl<'a> SyntaxError<'a> {
    fn expected(input: &'a str, label: &'static str) -> Self {
        Self {
            input,
            expected: Some(Cow::Borrowed(label)),
            detail: None,
        }
    }
}

impl<'a> NomParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            expected: None,
            detail: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    /// Keeps whichever branch got further; on a tie, reports both expectations.
    fn or(self, other: Self) -> Self {
        match self.input.len().cmp(&other.input.len()) {
            Ordering::Less => self,
            Ordering::Greater => other,
            Ordering::Equal => {
                let expected = match (self.expected, other.expected) {
                    (Some(a), Some(b)) if a != b => Some(Cow::Owned(format!("{} or {}", a, b))),
                    (a, b) => a.or(b),
                };
                Self {
                    input: self.input,
                    expected,
                    detail: self.detail.or(other.detail),
                }
            }
        }
    }
}

impl<'a> ContextError<&'a str> for SyntaxError<'a> {
    fn add_context(_input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        if other.expected.is_none() {
            other.expected = Some(Cow::Borrowed(ctx));
        }
        other
    }
}

impl<'a, E: fmt::Display> FromExternalError<&'a str, E> for SyntaxError<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: E) -> Self {
        // Regex errors render a multi-line diagram; the last line carries the reason.
        let message = e.to_string();
        let detail = message
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string();
        Self {
            input,
            expected: None,
            detail: Some(detail),
        }
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

const RESERVED: &[&str] = &[
    "select", "from", "where", "and", "or", "not", "as", "true", "false", "null", "group",
    "window", "sample",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

/// A case-insensitive keyword that is not the prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = SyntaxError<'a>> {
    terminated(tag_no_case(word), not(satisfy(is_ident_char)))
}

/// Folds `operand (op operand)*` into a left-associative tree.
fn binary_chain<'a, F, G>(
    operand: F,
    op: G,
    combine: fn(Box<Expr>, Box<Expr>) -> Expr,
) -> impl FnMut(&'a str) -> PResult<'a, Expr>
where
    F: Parser<&'a str, Output = Expr, Error = SyntaxError<'a>> + Clone,
    G: Parser<&'a str, Output = (), Error = SyntaxError<'a>> + Clone,
{
    move |input: &'a str| {
        let (input, first) = operand.clone().parse(input)?;
        let (input, rest) = many0(preceded(ws(op.clone()), cut(operand.clone()))).parse(input)?;
        let expr = rest
            .into_iter()
            .fold(first, |left, right| combine(Box::new(left), Box::new(right)));
        Ok((input, expr))
    }
}

// --- Statement ---

struct Grammar<'o> {
    options: &'o ParseOptions,
    depth: Cell<usize>,
}

impl Grammar<'_> {
    /// Runs `inner` one nesting level deeper, failing once `max_nesting` is passed.
    fn nested<'a, O>(&self, input: &'a str, inner: impl FnOnce(&'a str) -> PResult<'a, O>) -> PResult<'a, O> {
        let depth = self.depth.get() + 1;
        if depth > self.options.max_nesting {
            return Err(nom::Err::Failure(SyntaxError::expected(input, "shallower nesting")));
        }
        self.depth.set(depth);
        let result = inner(input);
        self.depth.set(depth - 1);
        result
    }

    fn statement<'a>(&self, input: &'a str) -> PResult<'a, Statement> {
        let (i, _) = context("'select'", ws(keyword("select"))).parse(input)?;
        let (i, select) = cut(context("select list", select_list)).parse(i)?;
        let (i, stream) = opt(preceded(
            ws(keyword("from")),
            cut(context("stream name", ws(identifier))),
        ))
        .parse(i)?;
        let (i, window) = opt(preceded(
            ws(keyword("window")),
            cut(context("window size", ws(unsigned))),
        ))
        .parse(i)?;
        let (i, where_clause) =
            opt(preceded(ws(keyword("where")), cut(|i: &'a str| self.expr(i)))).parse(i)?;
        let (i, group_by) = opt(preceded(
            ws(keyword("group")),
            cut(preceded(
                context("'by'", ws(keyword("by"))),
                separated_list1(ws(char(',')), cut(context("field path", ws(path_expr)))),
            )),
        ))
        .parse(i)?;
        let (i, sample) = opt(preceded(ws(keyword("sample")), cut(sample_config))).parse(i)?;
        let (i, _) = multispace0(i)?;

        Ok((
            i,
            Statement {
                select,
                stream: stream.unwrap_or("stream").to_string(),
                window,
                where_clause,
                group_by: group_by.unwrap_or_default(),
                sample,
            },
        ))
    }

    // --- Expression Parsers (in order of precedence) ---

    fn expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        self.or_expr(input)
    }

    fn or_expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        binary_chain(|i: &'a str| self.and_expr(i), or_op, Expr::Or)(input)
    }

    fn and_expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        binary_chain(|i: &'a str| self.not_expr(i), and_op, Expr::And)(input)
    }

    fn not_expr<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        if let Ok((i, _)) = ws(not_op).parse(input) {
            let (i, inner) = self.nested(i, |i| cut(|i: &'a str| self.not_expr(i)).parse(i))?;
            return Ok((i, Expr::Not(Box::new(inner))));
        }
        self.primary(input)
    }

    fn primary<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let open: PResult<'a, char> = ws(char('(')).parse(input);
        if let Ok((i, _)) = open {
            return self.nested(i, |i| {
                let (i, inner) = cut(|i: &'a str| self.expr(i)).parse(i)?;
                let (i, _) = cut(context("closing ')'", ws(char(')')))).parse(i)?;
                Ok((i, inner))
            });
        }
        self.comparison(input)
    }

    /// Comparisons are non-associative: at most one operator per operand pair.
    fn comparison<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (i, left) = context("operand", ws(operand)).parse(input)?;
        let (i, op) = opt(ws(compare_op)).parse(i)?;
        let Some(op) = op else {
            return Ok((i, left));
        };
        let (i, right) = if op == CompareOp::RegexMatch {
            cut(context("regular expression", ws(|i: &'a str| self.pattern(i)))).parse(i)?
        } else {
            cut(context("operand", ws(operand))).parse(i)?
        };
        Ok((
            i,
            Expr::Compare {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        ))
    }

    /// The right side of `=~`: a `/regex/` literal or a quoted string, matched
    /// against the whole left operand.
    fn pattern<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (i, source) = alt((regex_literal, string_literal)).parse(input)?;
        let compile = |pattern: &str| {
            RegexBuilder::new(pattern)
                .size_limit(self.options.regex_size_limit)
                .build()
                .map_err(|e| nom::Err::Failure(SyntaxError::from_external_error(input, ErrorKind::MapRes, e)))
        };
        // The bare source must be valid on its own, or the anchoring group could rebalance it.
        compile(&source)?;
        let regex = compile(&format!("^(?:{})$", source))?;
        Ok((i, Expr::Regex(Pattern::new(source, regex))))
    }
}

fn or_op(input: &str) -> PResult<'_, ()> {
    alt((value((), keyword("or")), value((), tag("||")))).parse(input)
}

fn and_op(input: &str) -> PResult<'_, ()> {
    alt((value((), keyword("and")), value((), tag("&&")))).parse(input)
}

fn not_op(input: &str) -> PResult<'_, ()> {
    alt((
        value((), keyword("not")),
        value((), terminated(char('!'), not(char('=')))),
    ))
    .parse(input)
}

fn compare_op(input: &str) -> PResult<'_, CompareOp> {
    alt((
        value(CompareOp::RegexMatch, tag("==~")),
        value(CompareOp::RegexMatch, tag("=~")),
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Neq, tag("!=")),
        value(CompareOp::Lte, tag("<=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gte, tag(">=")),
        value(CompareOp::Gt, tag(">")),
    ))
    .parse(input)
}

fn operand(input: &str) -> PResult<'_, Expr> {
    alt((
        value(Expr::BoolLiteral(true), keyword("true")),
        value(Expr::BoolLiteral(false), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
        map(number, Expr::Literal),
        map(string_literal, |s| Expr::Literal(Value::from(s))),
        map(path_expr, Expr::FieldRef),
    ))
    .parse(input)
}

// --- Select List ---

fn select_list(input: &str) -> PResult<'_, Vec<SelectItem>> {
    alt((
        map(ws(char('*')), |_| vec![SelectItem::All]),
        separated_list1(ws(char(',')), cut(context("field path", ws(select_item)))),
    ))
    .parse(input)
}

fn select_item(input: &str) -> PResult<'_, SelectItem> {
    let (i, path) = path_expr(input)?;
    let (i, alias) = opt(preceded(
        ws(keyword("as")),
        cut(context("alias", ws(identifier))),
    ))
    .parse(i)?;
    Ok((
        i,
        SelectItem::Path {
            path,
            alias: alias.map(str::to_string),
        },
    ))
}

// --- Path Parsers ---

fn identifier(input: &str) -> PResult<'_, &str> {
    verify(
        recognize(pair(alt((alpha1, tag("_"))), take_while(is_ident_char))),
        |word: &str| !is_reserved(word),
    )
    .parse(input)
}

/// `e[...]...` addresses the event root; any other leading identifier is
/// sugar for `e['identifier']`.
fn path_expr(input: &str) -> PResult<'_, PathExpression> {
    let (i, root) = identifier(input)?;
    let (i, brackets) = many0(bracket).parse(i)?;
    let segments = if root == "e" && !brackets.is_empty() {
        brackets
    } else {
        let mut segments = Vec::with_capacity(brackets.len() + 1);
        segments.push(PathSegment::Key(root.to_string()));
        segments.extend(brackets);
        segments
    };
    Ok((i, PathExpression::new(segments)))
}

fn bracket(input: &str) -> PResult<'_, PathSegment> {
    let (i, _) = char('[').parse(input)?;
    let (i, segment) = cut(context("path key", ws(path_key))).parse(i)?;
    let (i, _) = cut(context("closing ']'", char(']'))).parse(i)?;
    Ok((i, segment))
}

fn path_key(input: &str) -> PResult<'_, PathSegment> {
    alt((
        map(string_literal, PathSegment::Key),
        map(char('*'), |_| PathSegment::Wildcard),
        map(
            preceded(ws(char('^')), cut(context("quoted prefix", string_literal))),
            PathSegment::Prefix,
        ),
        map(integer, PathSegment::Index),
    ))
    .parse(input)
}

// --- Literal Parsers ---

fn integer(input: &str) -> PResult<'_, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| s.parse::<i64>()).parse(input)
}

fn unsigned(input: &str) -> PResult<'_, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>()).parse(input)
}

fn number(input: &str) -> PResult<'_, Value> {
    let (i, text) = recognize((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    if let Ok(n) = text.parse::<i64>() {
        return Ok((i, Value::from(n)));
    }
    text.parse::<f64>()
        .map(|f| (i, Value::from(f)))
        .map_err(|e| nom::Err::Failure(SyntaxError::from_external_error(input, ErrorKind::Float, e)))
}

/// A single- or double-quoted string. Backslash escapes the next character;
/// `\n` and `\t` are the usual control characters.
fn string_literal(input: &str) -> PResult<'_, String> {
    let (rest, quote) = one_of("'\"").parse(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((&rest[idx + c.len_utf8()..], out)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(nom::Err::Failure(SyntaxError::expected(
        &rest[rest.len()..],
        "closing quote",
    )))
}

/// A `/.../` regex literal. `\/` stands for a literal slash; every other
/// escape is passed through to the regex engine untouched.
fn regex_literal(input: &str) -> PResult<'_, String> {
    let (rest, _) = char('/').parse(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '/' => return Ok((&rest[idx + 1..], out)),
            '\\' => match chars.next() {
                Some((_, '/')) => out.push('/'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(nom::Err::Failure(SyntaxError::expected(
        &rest[rest.len()..],
        "closing '/'",
    )))
}

/// The JSON object following `sample`, decoded with serde.
fn sample_config(input: &str) -> PResult<'_, SampleConfig> {
    let start = input.trim_start();
    let mut stream = serde_json::Deserializer::from_str(start).into_iter::<SampleConfig>();
    match stream.next() {
        Some(Ok(config)) => Ok((&start[stream.byte_offset()..], config)),
        Some(Err(e)) => {
            let error = SyntaxError::from_external_error(start, ErrorKind::Verify, e);
            Err(nom::Err::Failure(SyntaxError::add_context(
                start,
                "sample configuration",
                error,
            )))
        }
        None => Err(nom::Err::Failure(SyntaxError::expected(
            start,
            "sample configuration",
        ))),
    }
}
