//! Solver model parsing
//!
//! Reads the `(get-model)` response into symbol assignments. Both the
//! `(model (define-fun ...) ...)` and the bare `((define-fun ...) ...)`
//! layouts are accepted.

use std::collections::BTreeMap;
use std::fmt;

/// S-expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(s) => Some(s),
            SExpr::List(_) => None,
        }
    }

    pub fn list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            SExpr::Atom(_) => None,
        }
    }

    /// Parse every top-level expression in `input`
    pub fn parse_all(input: &str) -> Option<Vec<SExpr>> {
        let mut parser = Parser {
            chars: input.char_indices().peekable(),
            input,
        };
        let mut out = Vec::new();
        loop {
            parser.skip_ws();
            if parser.chars.peek().is_none() {
                return Some(out);
            }
            out.push(parser.expr()?);
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(s) => write!(f, "{s}"),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else if c == ';' {
                while let Some((_, c)) = self.chars.next() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expr(&mut self) -> Option<SExpr> {
        self.skip_ws();
        let &(start, c) = self.chars.peek()?;
        match c {
            '(' => {
                self.chars.next();
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    if matches!(self.chars.peek(), Some((_, ')'))) {
                        self.chars.next();
                        return Some(SExpr::List(items));
                    }
                    items.push(self.expr()?);
                }
            }
            ')' => None,
            '|' => {
                self.chars.next();
                for (end, c) in self.chars.by_ref() {
                    if c == '|' {
                        return Some(SExpr::Atom(self.input[start..=end].to_string()));
                    }
                }
                None
            }
            '"' => {
                self.chars.next();
                while let Some((end, c)) = self.chars.next() {
                    if c == '"' {
                        // "" is an escaped quote
                        if matches!(self.chars.peek(), Some((_, '"'))) {
                            self.chars.next();
                            continue;
                        }
                        return Some(SExpr::Atom(self.input[start..=end].to_string()));
                    }
                }
                None
            }
            _ => {
                let mut end = start;
                while let Some(&(i, c)) = self.chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    end = i + c.len_utf8();
                    self.chars.next();
                }
                Some(SExpr::Atom(self.input[start..end].to_string()))
            }
        }
    }
}

/// Constant assignments from a satisfying model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<String, SExpr>,
}

impl Model {
    /// Parse a `(get-model)` response. Returns `None` when the text is not a model.
    pub fn parse(text: &str) -> Option<Self> {
        let exprs = SExpr::parse_all(text)?;
        let top = exprs.into_iter().find(|e| e.list().is_some())?;
        let SExpr::List(mut items) = top else {
            return None;
        };
        if items.first().and_then(SExpr::atom) == Some("model") {
            items.remove(0);
        }

        let mut values = BTreeMap::new();
        for item in items {
            // (define-fun name () Sort value)
            let Some(parts) = item.list() else { continue };
            if let [SExpr::Atom(kw), SExpr::Atom(name), SExpr::List(args), _sort, value] = parts
                && kw == "define-fun"
                && args.is_empty()
            {
                values.insert(name.clone(), value.clone());
            }
        }
        Some(Self { values })
    }

    pub fn get(&self, symbol: &str) -> Option<&SExpr> {
        self.values.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Human-readable scalar value, if the symbol holds one
    pub fn render(&self, symbol: &str) -> Option<String> {
        render_value(self.get(symbol)?)
    }

    pub fn int(&self, symbol: &str) -> Option<i64> {
        int_value(self.get(symbol)?)
    }
}

fn int_value(value: &SExpr) -> Option<i64> {
    match value {
        SExpr::Atom(s) => s.parse().ok(),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(op), inner] if op == "-" => int_value(inner)?.checked_neg(),
            _ => None,
        },
    }
}

fn real_value(value: &SExpr) -> Option<f64> {
    match value {
        SExpr::Atom(s) => s.parse().ok(),
        SExpr::List(items) => match items.as_slice() {
            [SExpr::Atom(op), inner] if op == "-" => real_value(inner).map(|x| -x),
            [SExpr::Atom(op), num, den] if op == "/" => {
                let den = real_value(den)?;
                (den != 0.0).then(|| real_value(num).map(|n| n / den)).flatten()
            }
            _ => None,
        },
    }
}

/// Render an integer, real or boolean model value
pub fn render_value(value: &SExpr) -> Option<String> {
    match value.atom() {
        Some("true") => return Some("true".to_string()),
        Some("false") => return Some("false".to_string()),
        _ => {}
    }
    if let Some(n) = int_value(value) {
        return Some(n.to_string());
    }
    real_value(value).map(|x| format!("{x:?}"))
}
