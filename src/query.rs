//! Path queries over a parsed [`Document`]
//!
//! Supports the location-path core of XPath 1.0: absolute and relative
//! paths, `//`, `.`/`..`, the child, descendant, descendant-or-self, self,
//! parent and attribute axes, name tests with namespace prefixes, `text()`
//! and `node()`, and predicates built from `and`, `or`, `=`, `!=`, literals,
//! positions and a handful of string functions.

use crate::error::{Error, Result};
use crate::xml::{Document, Namespaces, NodeId, DOCUMENT};
use std::fmt;

/// One item selected by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Match {
    Element(NodeId),
    Attribute(NodeId, usize),
    Text(NodeId),
}

impl Match {
    /// Arena node of this match; the owning element for attributes.
    pub fn node(&self) -> NodeId {
        match *self {
            Match::Element(n) | Match::Attribute(n, _) | Match::Text(n) => n,
        }
    }

    /// String value: attribute value, text, or element text content.
    pub fn value(&self, doc: &Document) -> String {
        match *self {
            Match::Element(n) => doc.string_value(n),
            Match::Attribute(n, i) => doc.node(n).attributes[i].value.clone(),
            Match::Text(n) => doc.node(n).text.clone(),
        }
    }

    fn order_key(&self) -> (NodeId, u8, usize) {
        match *self {
            Match::Element(n) => (n, 0, 0),
            Match::Attribute(n, i) => (n, 1, i),
            Match::Text(n) => (n, 2, 0),
        }
    }
}

/// A compiled query.
#[derive(Debug, Clone)]
pub struct Query {
    source: String,
    path: Path,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Query {
    pub fn parse(expr: &str) -> Result<Self> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            source: expr,
            tokens,
            pos: 0,
        };
        let path = parser.parse_path()?;
        if let Some(tok) = parser.peek() {
            return Err(Error::invalid_query(expr, format!("unexpected {tok:?}")));
        }
        Ok(Query {
            source: expr.to_string(),
            path,
        })
    }

    /// `href` of every element named `link` (any namespace) at or below the
    /// context node whose `rel` equals `relation`.
    pub fn link_href(relation: &str) -> Self {
        let is_link = Expr::Eq(
            Box::new(Expr::Call(Function::LocalName, vec![])),
            Box::new(Expr::Literal("link".into())),
        );
        let has_rel = Expr::Eq(
            Box::new(Expr::Path(Path {
                absolute: false,
                steps: vec![Step::attribute("rel")],
            })),
            Box::new(Expr::Literal(relation.to_string())),
        );
        Query {
            source: format!(
                "descendant-or-self::*[local-name()='link' and @rel={relation:?}]/@href"
            ),
            path: Path {
                absolute: false,
                steps: vec![
                    Step {
                        axis: Axis::DescendantOrSelf,
                        test: NodeTest::AnyName(None),
                        predicates: vec![Expr::And(Box::new(is_link), Box::new(has_rel))],
                    },
                    Step::attribute("href"),
                ],
            },
        }
    }

    /// Evaluate against `doc` with `context` as the context node.
    /// Results are in document order without duplicates.
    pub fn evaluate(
        &self,
        doc: &Document,
        context: NodeId,
        namespaces: &Namespaces,
    ) -> Result<Vec<Match>> {
        let eval = Evaluator {
            doc,
            namespaces,
            source: &self.source,
        };
        eval.path(&self.path, Match::Element(context))
    }
}

// ---------------------------------------------------------------------------
// AST

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
    Attribute,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(Option<String>, String),
    AnyName(Option<String>),
    Text,
    Node,
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn attribute(name: &str) -> Self {
        Step {
            axis: Axis::Attribute,
            test: NodeTest::Name(None, name.to_string()),
            predicates: vec![],
        }
    }

    fn descendant_or_self_node() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: vec![],
        }
    }
}

#[derive(Debug, Clone)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Function {
    LocalName,
    Name,
    NamespaceUri,
    Not,
    Contains,
    StartsWith,
}

impl Function {
    fn lookup(name: &str) -> Option<(Self, std::ops::RangeInclusive<usize>)> {
        Some(match name {
            "local-name" => (Function::LocalName, 0..=1),
            "name" => (Function::Name, 0..=1),
            "namespace-uri" => (Function::NamespaceUri, 0..=1),
            "not" => (Function::Not, 1..=1),
            "contains" => (Function::Contains, 2..=2),
            "starts-with" => (Function::StartsWith, 2..=2),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Path(Path),
    Literal(String),
    Number(f64),
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

// ---------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    Star,
    Eq,
    NotEq,
    Axis(String),
    Name(String),
    Literal(String),
    Number(f64),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| Error::invalid_query(expr, "unterminated string literal"))?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse()
                    .map_err(|_| Error::invalid_query(expr, format!("bad number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
                let mut name: String = chars[start..i].iter().collect();

                if chars.get(i) == Some(&':') && chars.get(i + 1) == Some(&':') {
                    tokens.push(Token::Axis(name));
                    i += 2;
                    continue;
                }
                if chars.get(i) == Some(&':') {
                    match chars.get(i + 1) {
                        Some('*') => {
                            name.push_str(":*");
                            i += 2;
                        }
                        Some(&n) if is_name_start(n) => {
                            name.push(':');
                            i += 1;
                            while i < chars.len() && is_name_char(chars[i]) {
                                name.push(chars[i]);
                                i += 1;
                            }
                        }
                        _ => return Err(Error::invalid_query(expr, "dangling ':'")),
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => {
                return Err(Error::invalid_query(
                    expr,
                    format!("unexpected character '{other}'"),
                ))
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(self.error(format!("expected {want:?}, found {tok:?}"))),
            None => Err(self.error(format!("expected {want:?}, found end of query"))),
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::invalid_query(self.source, reason)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_) | Token::Axis(_)
            )
        )
    }

    fn parse_path(&mut self) -> Result<Path> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                if !self.starts_step() {
                    return Ok(Path {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                steps.push(Step::descendant_or_self_node());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.advance();
                }
                Some(Token::DoubleSlash) => {
                    self.advance();
                    steps.push(Step::descendant_or_self_node());
                }
                _ => break,
            }
            steps.push(self.parse_step()?);
        }

        Ok(Path { absolute, steps })
    }

    fn parse_step(&mut self) -> Result<Step> {
        let axis = match self.peek() {
            Some(Token::Dot) => {
                self.advance();
                return Ok(Step {
                    axis: Axis::SelfNode,
                    test: NodeTest::Node,
                    predicates: vec![],
                });
            }
            Some(Token::DotDot) => {
                self.advance();
                return Ok(Step {
                    axis: Axis::Parent,
                    test: NodeTest::Node,
                    predicates: vec![],
                });
            }
            Some(Token::At) => {
                self.advance();
                Axis::Attribute
            }
            Some(Token::Axis(name)) => {
                let axis = match name.as_str() {
                    "child" => Axis::Child,
                    "descendant" => Axis::Descendant,
                    "descendant-or-self" => Axis::DescendantOrSelf,
                    "self" => Axis::SelfNode,
                    "parent" => Axis::Parent,
                    "attribute" => Axis::Attribute,
                    other => return Err(self.error(format!("unsupported axis '{other}'"))),
                };
                self.advance();
                axis
            }
            _ => Axis::Child,
        };

        let test = self.parse_node_test()?;
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.advance();
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::AnyName(None)),
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let test = match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::Node,
                        other => {
                            return Err(self.error(format!("'{other}()' is not a node test")))
                        }
                    };
                    self.advance();
                    self.expect(Token::RParen)?;
                    return Ok(test);
                }
                if let Some(prefix) = name.strip_suffix(":*") {
                    return Ok(NodeTest::AnyName(Some(prefix.to_string())));
                }
                Ok(match name.split_once(':') {
                    Some((prefix, local)) => {
                        NodeTest::Name(Some(prefix.to_string()), local.to_string())
                    }
                    None => NodeTest::Name(None, name),
                })
            }
            Some(tok) => Err(self.error(format!("expected node test, found {tok:?}"))),
            None => Err(self.error("expected node test, found end of query")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Name(n)) if n == "or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Some(Token::Name(n)) if n == "and") {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_primary()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.advance();
                let right = self.parse_primary()?;
                Ok(Expr::Eq(Box::new(left), Box::new(right)))
            }
            Some(Token::NotEq) => {
                self.advance();
                let right = self.parse_primary()?;
                Ok(Expr::NotEq(Box::new(left), Box::new(right)))
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Literal(s)) => {
                self.advance();
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) => {
                match Function::lookup(&name) {
                    Some((function, arity)) => {
                        self.advance();
                        self.advance();
                        let args = self.parse_args()?;
                        if !arity.contains(&args.len()) {
                            return Err(self.error(format!(
                                "{name}() takes {arity:?} arguments, got {}",
                                args.len()
                            )));
                        }
                        Ok(Expr::Call(function, args))
                    }
                    None if name == "text" || name == "node" => Ok(Expr::Path(self.parse_path()?)),
                    None => Err(self.error(format!("unknown function '{name}()'"))),
                }
            }
            Some(_) => Ok(Expr::Path(self.parse_path()?)),
            None => Err(self.error("unexpected end of query")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation

#[derive(Debug)]
enum Value {
    Nodes(Vec<Match>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Evaluator<'a> {
    doc: &'a Document,
    namespaces: &'a Namespaces,
    source: &'a str,
}

impl Evaluator<'_> {
    fn path(&self, path: &Path, context: Match) -> Result<Vec<Match>> {
        let mut current = if path.absolute {
            vec![Match::Element(DOCUMENT)]
        } else {
            vec![context]
        };

        for step in &path.steps {
            let mut next = Vec::new();
            for &item in &current {
                let mut candidates = Vec::new();
                for m in self.axis(step.axis, item) {
                    if self.node_test(&step.test, step.axis, m)? {
                        candidates.push(m);
                    }
                }
                for predicate in &step.predicates {
                    let size = candidates.len();
                    let mut kept = Vec::with_capacity(size);
                    for (i, m) in candidates.into_iter().enumerate() {
                        if self.predicate(predicate, m, i + 1)? {
                            kept.push(m);
                        }
                    }
                    candidates = kept;
                }
                next.extend(candidates);
            }
            next.sort_by_key(Match::order_key);
            next.dedup();
            current = next;
        }

        Ok(current)
    }

    fn axis(&self, axis: Axis, item: Match) -> Vec<Match> {
        let Match::Element(node) = item else {
            return match axis {
                Axis::SelfNode | Axis::DescendantOrSelf => vec![item],
                Axis::Parent => self.parent(item).into_iter().collect(),
                _ => vec![],
            };
        };

        let element = self.doc.node(node);
        match axis {
            Axis::Child => element.children.iter().map(|&c| self.wrap(c)).collect(),
            Axis::Descendant | Axis::DescendantOrSelf => self
                .doc
                .descendants_or_self(node)
                .into_iter()
                .filter(|&n| n != node || axis == Axis::DescendantOrSelf)
                .map(|n| self.wrap(n))
                .collect(),
            Axis::SelfNode => vec![item],
            Axis::Parent => self.parent(item).into_iter().collect(),
            Axis::Attribute if node != DOCUMENT => (0..element.attributes.len())
                .map(|i| Match::Attribute(node, i))
                .collect(),
            Axis::Attribute => vec![],
        }
    }

    fn wrap(&self, id: NodeId) -> Match {
        if self.doc.node(id).is_text() {
            Match::Text(id)
        } else {
            Match::Element(id)
        }
    }

    fn parent(&self, item: Match) -> Option<Match> {
        match item {
            Match::Attribute(owner, _) => Some(Match::Element(owner)),
            Match::Element(n) | Match::Text(n) => self.doc.node(n).parent.map(Match::Element),
        }
    }

    fn node_test(&self, test: &NodeTest, axis: Axis, m: Match) -> Result<bool> {
        let (namespace, local) = match m {
            Match::Element(DOCUMENT) => return Ok(*test == NodeTest::Node),
            Match::Text(_) => return Ok(matches!(test, NodeTest::Text | NodeTest::Node)),
            Match::Attribute(n, i) if axis == Axis::Attribute => {
                let attr = &self.doc.node(n).attributes[i];
                (attr.namespace.as_deref(), attr.local_name.as_str())
            }
            Match::Attribute(..) => return Ok(*test == NodeTest::Node),
            Match::Element(n) => {
                let element = self.doc.node(n);
                (element.namespace.as_deref(), element.local_name.as_str())
            }
        };

        match test {
            NodeTest::Node => Ok(true),
            NodeTest::Text => Ok(false),
            NodeTest::AnyName(None) => Ok(true),
            NodeTest::AnyName(Some(prefix)) => self.namespace_matches(Some(prefix), namespace),
            NodeTest::Name(prefix, name) => {
                Ok(name == local && self.namespace_matches(prefix.as_deref(), namespace)?)
            }
        }
    }

    fn namespace_matches(&self, prefix: Option<&str>, namespace: Option<&str>) -> Result<bool> {
        match prefix {
            None => Ok(namespace.is_none()),
            Some(p) => {
                let uri = self.namespaces.get(p).ok_or_else(|| {
                    Error::invalid_query(self.source, format!("unbound namespace prefix '{p}'"))
                })?;
                Ok(namespace == Some(uri.as_str()))
            }
        }
    }

    fn predicate(&self, expr: &Expr, context: Match, position: usize) -> Result<bool> {
        Ok(match self.expr(expr, context)? {
            Value::Num(n) => n == position as f64,
            other => self.boolean(&other),
        })
    }

    fn expr(&self, expr: &Expr, context: Match) -> Result<Value> {
        Ok(match expr {
            Expr::Path(path) => Value::Nodes(self.path(path, context)?),
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Num(*n),
            Expr::Or(a, b) => Value::Bool(
                self.boolean(&self.expr(a, context)?) || self.boolean(&self.expr(b, context)?),
            ),
            Expr::And(a, b) => Value::Bool(
                self.boolean(&self.expr(a, context)?) && self.boolean(&self.expr(b, context)?),
            ),
            Expr::Eq(a, b) => {
                Value::Bool(self.compare(&self.expr(a, context)?, &self.expr(b, context)?, true))
            }
            Expr::NotEq(a, b) => {
                Value::Bool(self.compare(&self.expr(a, context)?, &self.expr(b, context)?, false))
            }
            Expr::Call(function, args) => self.call(*function, args, context)?,
        })
    }

    fn call(&self, function: Function, args: &[Expr], context: Match) -> Result<Value> {
        let target = |eval: &Self| -> Result<Option<Match>> {
            match args.first() {
                None => Ok(Some(context)),
                Some(arg) => match eval.expr(arg, context)? {
                    Value::Nodes(nodes) => Ok(nodes.first().copied()),
                    _ => Err(Error::invalid_query(eval.source, "expected a node-set argument")),
                },
            }
        };

        Ok(match function {
            Function::LocalName => Value::Str(
                target(self)?
                    .and_then(|m| self.names(m))
                    .map(|(local, _, _)| local)
                    .unwrap_or_default(),
            ),
            Function::Name => Value::Str(
                target(self)?
                    .and_then(|m| self.names(m))
                    .map(|(_, qualified, _)| qualified)
                    .unwrap_or_default(),
            ),
            Function::NamespaceUri => Value::Str(
                target(self)?
                    .and_then(|m| self.names(m))
                    .and_then(|(_, _, ns)| ns)
                    .unwrap_or_default(),
            ),
            Function::Not => Value::Bool(!self.boolean(&self.expr(&args[0], context)?)),
            Function::Contains => {
                let haystack = self.string(&self.expr(&args[0], context)?);
                let needle = self.string(&self.expr(&args[1], context)?);
                Value::Bool(haystack.contains(&needle))
            }
            Function::StartsWith => {
                let haystack = self.string(&self.expr(&args[0], context)?);
                let prefix = self.string(&self.expr(&args[1], context)?);
                Value::Bool(haystack.starts_with(&prefix))
            }
        })
    }

    /// (local name, qualified name, namespace URI) of an element or attribute.
    fn names(&self, m: Match) -> Option<(String, String, Option<String>)> {
        match m {
            Match::Element(DOCUMENT) | Match::Text(_) => None,
            Match::Element(n) => {
                let e = self.doc.node(n);
                Some((e.local_name.clone(), e.name(), e.namespace.clone()))
            }
            Match::Attribute(n, i) => {
                let a = &self.doc.node(n).attributes[i];
                Some((a.local_name.clone(), a.name(), a.namespace.clone()))
            }
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|m| m.value(self.doc))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Value::Num(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn compare(&self, a: &Value, b: &Value, equal: bool) -> bool {
        let test = |x: bool| x == equal;
        match (a, b) {
            (Value::Nodes(xs), Value::Nodes(ys)) => xs.iter().any(|x| {
                let xv = x.value(self.doc);
                ys.iter().any(|y| test(xv == y.value(self.doc)))
            }),
            (Value::Nodes(xs), other) | (other, Value::Nodes(xs)) => match other {
                Value::Bool(b) => test(!xs.is_empty() == *b),
                Value::Num(n) => xs
                    .iter()
                    .any(|x| test(x.value(self.doc).trim().parse::<f64>().ok() == Some(*n))),
                _ => {
                    let s = self.string(other);
                    xs.iter().any(|x| test(x.value(self.doc) == s))
                }
            },
            (Value::Bool(_), _) | (_, Value::Bool(_)) => test(self.boolean(a) == self.boolean(b)),
            (Value::Num(_), _) | (_, Value::Num(_)) => {
                test(self.number(a) == self.number(b))
            }
            _ => test(self.string(a) == self.string(b)),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => self.string(other).trim().parse().unwrap_or(f64::NAN),
        }
    }
}
