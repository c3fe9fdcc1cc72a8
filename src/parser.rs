//! Recursive-descent parser: token stream -> `Vec<Statement>`.
//!
//! The concrete grammar is a collaborator (§6.1), so this parser only needs
//! to be internally consistent with [`crate::lexer`] and produce the shapes
//! [`crate::value::Statement`] defines. It recognizes block headers, plain
//! `key: value` / positional attribute lines, and the five DSL-only
//! statement shapes (`Predicate`, `In`, `From`, `Mutate`, `Rel`) directly,
//! the way the grammar in spec.md §4.9–4.10 assumes the parser already has.

use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::value::{MutateOp, Operator, Span, Statement, Value};

pub struct Parser<'a> {
    file: String,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    _source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(file: impl Into<String>, source: &'a str) -> Self {
        let file = file.into();
        let mut lexer = Lexer::new(file.clone(), source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        let mut errors: Vec<ParseError> = lexer
            .errors()
            .iter()
            .cloned()
            .map(ParseError::from)
            .collect();
        errors.sort_by_key(|e| e.span().start.offset);
        Self {
            file,
            tokens,
            pos: 0,
            errors,
            _source: source,
        }
    }

    pub fn parse(mut self) -> (Vec<Statement>, Vec<ParseError>) {
        let statements = self.parse_statements(&[TokenKind::Eof]);
        (statements, self.errors)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn error_here(&mut self, expected: &str) {
        let tok = self.peek().clone();
        self.errors.push(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: tok.kind.to_string(),
            span: tok.span,
        });
    }

    /// Parses statements until one of `terminators` is reached (the
    /// terminator itself is left unconsumed).
    fn parse_statements(&mut self, terminators: &[TokenKind]) -> Vec<Statement> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !terminators.contains(&self.peek_kind()) {
            if self.peek_kind() == TokenKind::Eof {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => {
                    // Recover by skipping to the next newline.
                    while !matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
                        self.advance();
                    }
                }
            }
            self.skip_newlines();
        }
        statements
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        let line = self.collect_line();
        if line.is_empty() {
            return None;
        }
        self.parse_line(line)
    }

    /// Gathers one logical line's tokens: everything up to (but not
    /// including) the matching `do`/`end`/newline/EOF, tracking bracket
    /// depth so `[ ]`, `{ }`, `( )` can span the line.
    fn collect_line(&mut self) -> Vec<Token> {
        let mut depth = 0i32;
        let mut out = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline if depth == 0 => break,
                TokenKind::Do if depth == 0 && !out.is_empty() => {
                    out.push(self.advance());
                    break;
                }
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => {
                    depth += 1;
                    out.push(self.advance());
                }
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    depth -= 1;
                    out.push(self.advance());
                }
                _ => out.push(self.advance()),
            }
        }
        out
    }

    fn parse_line(&mut self, line: Vec<Token>) -> Option<Statement> {
        let ends_with_do = line.last().is_some_and(|t| t.kind == TokenKind::Do);
        let body_tokens = if ends_with_do { &line[..line.len() - 1] } else { &line[..] };

        if body_tokens.is_empty() {
            self.error_here("a statement");
            return None;
        }

        let keyword = body_tokens[0].lexeme.clone();

        if ends_with_do {
            return self.finish_block(keyword, &body_tokens[1..], line.last().unwrap().span.clone());
        }

        match keyword.as_str() {
            "mutate" => return self.parse_mutate(body_tokens),
            "rel" => return self.parse_rel(body_tokens),
            "from" => return self.parse_from(body_tokens),
            _ => {}
        }

        if body_tokens.len() >= 2 && body_tokens[1].kind == TokenKind::Identifier && body_tokens[1].lexeme == "in" {
            return self.parse_in(body_tokens);
        }

        if let Some(op_idx) = body_tokens.iter().position(|t| {
            matches!(
                t.kind,
                TokenKind::Gt | TokenKind::Ge | TokenKind::Lt | TokenKind::Le | TokenKind::EqEq
            )
        }) {
            return self.parse_predicate(body_tokens, op_idx);
        }

        self.parse_attribute(body_tokens)
    }

    fn line_span(&self, tokens: &[Token], fallback: &Span) -> Span {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => first.span.merge(&last.span),
            _ => fallback.clone(),
        }
    }

    fn finish_block(&mut self, name: String, label_tokens: &[Token], do_span: Span) -> Option<Statement> {
        let labels = label_tokens.iter().map(|t| t.lexeme.clone()).collect();
        let body = self.parse_statements(&[TokenKind::End]);
        let end_span = if self.peek_kind() == TokenKind::End {
            self.advance().span
        } else {
            self.error_here("end");
            do_span.clone()
        };
        Some(Statement::Block {
            name,
            labels,
            body,
            span: do_span.merge(&end_span),
        })
    }

    /// Keys whose positional grammar (§4.6.2) mixes labels and value tokens
    /// too freely for the generic label/value split below to track; the
    /// whole remainder is kept as a flat token array and handed to a
    /// dedicated builder instead (`builders::positional`).
    const FLAT_POSITIONAL_KEYS: &'static [&'static str] = &[
        "axis",
        "tag",
        "relationship_kind",
        "seed_relationship",
        "axis_bias",
        "home_region",
        "subtype",
        "status",
        "required",
        "bounds",
        "prominence",
        "set_tag",
        "remove_tag",
        "change_status",
        "adjust_prominence",
        "archive_relationship",
        "archive_all_relationships",
        "update_rate_limit",
        "step",
        "where",
        "filter",
        "prefer",
    ];

    fn parse_attribute(&mut self, tokens: &[Token]) -> Option<Statement> {
        let span = self.line_span(tokens, &tokens[0].span);
        let key = tokens[0].lexeme.clone();
        let mut rest = &tokens[1..];
        if rest.first().is_some_and(|t| t.kind == TokenKind::Colon) {
            rest = &rest[1..];
        }
        if rest.is_empty() {
            return Some(Statement::Attribute {
                key,
                labels: Vec::new(),
                value: Value::Null,
                span,
            });
        }
        if Self::FLAT_POSITIONAL_KEYS.contains(&key.as_str()) && rest.first().is_some_and(|t| t.kind != TokenKind::LBrace) {
            // The first token is the id label (so C5 can recognize this as
            // a promotable inline-item attribute); everything after it is
            // kept as a flat token array for the positional builder.
            let id_label = rest[0].lexeme.clone();
            let value = self.flat_token_array(&rest[1..]);
            return Some(Statement::Attribute {
                key,
                labels: vec![id_label],
                value,
                span,
            });
        }
        let (labels, value) = self.split_labels_and_value(rest);
        Some(Statement::Attribute {
            key,
            labels,
            value,
            span,
        })
    }

    /// Turns a flat token run into a `Value::Array`, one element per token,
    /// expanding bracketed sub-sequences (`[a b c]`) into nested arrays and
    /// keeping `->` as a literal identifier so positional builders can find
    /// it by position.
    fn flat_token_array(&mut self, tokens: &[Token]) -> Value {
        let mut items = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i].kind {
                TokenKind::LBracket => {
                    let mut depth = 1;
                    let mut j = i + 1;
                    while j < tokens.len() && depth > 0 {
                        match tokens[j].kind {
                            TokenKind::LBracket => depth += 1,
                            TokenKind::RBracket => depth -= 1,
                            _ => {}
                        }
                        j += 1;
                    }
                    items.push(self.array_from_tokens(&tokens[i..j]));
                    i = j;
                }
                TokenKind::Arrow => {
                    items.push(Value::Identifier("->".to_string()));
                    i += 1;
                }
                _ => {
                    items.push(self.scalar_from_token(&tokens[i]));
                    i += 1;
                }
            }
        }
        Value::Array(items)
    }

    /// Everything but the last value-shaped token run is treated as labels,
    /// e.g. `axis moral "Moral Axis" good -> evil` -> key `axis`,
    /// labels `["moral", "Moral Axis"]`, value `good -> evil`.
    fn split_labels_and_value(&mut self, tokens: &[Token]) -> (Vec<String>, Value) {
        if tokens.len() == 1 {
            return (Vec::new(), self.value_from_tokens(tokens));
        }
        // An arrow chain, array/object/call literal, or bool/number/null
        // always starts the trailing value; bare identifiers/strings before
        // that are labels. A closing bracket/brace/paren is scanned back to
        // its matching opener as one unit (a call literal also absorbs the
        // identifier naming it) rather than being read token-by-token, since
        // the scan runs from the *last* token of the value, not the first.
        let mut split_at = tokens.len();
        let mut i = tokens.len();
        while i > 0 {
            i -= 1;
            let tok = &tokens[i];
            let open_kind = match tok.kind {
                TokenKind::RBrace => Some(TokenKind::LBrace),
                TokenKind::RBracket => Some(TokenKind::LBracket),
                TokenKind::RParen => Some(TokenKind::LParen),
                _ => None,
            };
            if let Some(open_kind) = open_kind {
                let close_kind = tok.kind;
                let mut depth = 1;
                let mut j = i;
                while j > 0 && depth > 0 {
                    j -= 1;
                    if tokens[j].kind == close_kind {
                        depth += 1;
                    } else if tokens[j].kind == open_kind {
                        depth -= 1;
                    }
                }
                split_at = if open_kind == TokenKind::LParen && j > 0 && tokens[j - 1].kind == TokenKind::Identifier {
                    j - 1
                } else {
                    j
                };
                break;
            }
            let is_value_start = matches!(tok.kind, TokenKind::Number | TokenKind::True | TokenKind::False | TokenKind::Null)
                || (tok.kind == TokenKind::Identifier && self.peek_at_index(tokens, i + 1) == Some(TokenKind::LParen));
            if is_value_start {
                split_at = i;
            } else if i + 1 < tokens.len() && tokens[i + 1].kind == TokenKind::Arrow {
                split_at = i;
            } else {
                break;
            }
        }
        if split_at == tokens.len() {
            split_at = tokens.len() - 1;
        }
        let labels = tokens[..split_at]
            .iter()
            .map(|t| t.lexeme.clone())
            .collect();
        let value = self.value_from_tokens(&tokens[split_at..]);
        (labels, value)
    }

    fn peek_at_index(&self, tokens: &[Token], idx: usize) -> Option<TokenKind> {
        tokens.get(idx).map(|t| t.kind)
    }

    /// Parses a value out of an already-sliced token run (no consumption of
    /// `self.tokens`, since the caller already isolated the line).
    fn value_from_tokens(&mut self, tokens: &[Token]) -> Value {
        if tokens.is_empty() {
            return Value::Null;
        }
        if tokens.iter().any(|t| t.kind == TokenKind::Arrow) {
            let parts: Vec<Value> = tokens
                .iter()
                .filter(|t| t.kind != TokenKind::Arrow)
                .map(|t| self.scalar_from_token(t))
                .collect();
            return Value::Array(parts);
        }
        if tokens.len() == 1 {
            return self.scalar_from_token(&tokens[0]);
        }
        if tokens[0].kind == TokenKind::LBracket {
            return self.array_from_tokens(tokens);
        }
        if tokens[0].kind == TokenKind::LBrace {
            return self.object_from_tokens(tokens);
        }
        if tokens[0].kind == TokenKind::Identifier && tokens.get(1).is_some_and(|t| t.kind == TokenKind::LParen) {
            return self.call_from_tokens(tokens);
        }
        // Fallback: a bare sequence of scalars with no bracket/call/arrow
        // shape is a positional token list (`axis_bias moral 0.2 0.3 0.4`,
        // `home_region coastal a b`), not a joined string.
        Value::Array(tokens.iter().map(|t| self.scalar_from_token(t)).collect())
    }

    fn scalar_from_token(&self, tok: &Token) -> Value {
        match tok.kind {
            TokenKind::String => Value::String(tok.lexeme.clone()),
            TokenKind::Number => Value::Number(tok.lexeme.parse().unwrap_or(0.0)),
            TokenKind::True => Value::Bool(true),
            TokenKind::False => Value::Bool(false),
            TokenKind::Null => Value::Null,
            _ => Value::Identifier(tok.lexeme.clone()),
        }
    }

    fn array_from_tokens(&mut self, tokens: &[Token]) -> Value {
        let inner = &tokens[1..tokens.len().saturating_sub(1)];
        let items = self.split_top_level(inner, TokenKind::Comma)
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(|group| self.value_from_tokens(&group))
            .collect();
        Value::Array(items)
    }

    fn object_from_tokens(&mut self, tokens: &[Token]) -> Value {
        let inner = &tokens[1..tokens.len().saturating_sub(1)];
        let mut entries = Vec::new();
        for group in self.split_top_level(inner, TokenKind::Comma) {
            if group.is_empty() {
                continue;
            }
            let key = group[0].lexeme.clone();
            let value_tokens = if group.get(1).is_some_and(|t| t.kind == TokenKind::Colon) {
                &group[2..]
            } else {
                &group[1..]
            };
            let value = self.value_from_tokens(value_tokens);
            Value::merge_object_entry(&mut entries, key, value);
        }
        Value::Object(entries)
    }

    fn call_from_tokens(&mut self, tokens: &[Token]) -> Value {
        let name = tokens[0].lexeme.clone();
        let inner = &tokens[2..tokens.len().saturating_sub(1)];
        let args = self.split_top_level(inner, TokenKind::Comma)
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(|group| self.value_from_tokens(&group))
            .collect();
        Value::Call { name, args }
    }

    /// Splits a token slice on `sep` at bracket depth 0.
    fn split_top_level(&self, tokens: &[Token], sep: TokenKind) -> Vec<Vec<Token>> {
        let mut groups = Vec::new();
        let mut current = Vec::new();
        let mut depth = 0i32;
        for tok in tokens {
            match tok.kind {
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => {
                    depth += 1;
                    current.push(tok.clone());
                }
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    depth -= 1;
                    current.push(tok.clone());
                }
                k if k == sep && depth == 0 => {
                    groups.push(std::mem::take(&mut current));
                }
                _ => current.push(tok.clone()),
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }

    fn parse_in(&mut self, tokens: &[Token]) -> Option<Statement> {
        let span = self.line_span(tokens, &tokens[0].span);
        let key = tokens[0].lexeme.clone();
        let rest = &tokens[2..];
        let value = self.value_from_tokens(rest);
        let items = value.as_array().map(|s| s.to_vec()).unwrap_or_else(|| vec![value]);
        Some(Statement::In { key, items, span })
    }

    fn parse_predicate(&mut self, tokens: &[Token], op_idx: usize) -> Option<Statement> {
        let span = self.line_span(tokens, &tokens[0].span);
        let operator = Operator::from_token(&tokens[op_idx].lexeme)?;
        let keyword = tokens[0].lexeme.clone();
        let middle = &tokens[1..op_idx];
        let (subject, field) = match middle.len() {
            0 => {
                self.error_here("a predicate subject");
                return None;
            }
            1 => (middle[0].lexeme.clone(), None),
            _ => (middle[0].lexeme.clone(), Some(middle[1].lexeme.clone())),
        };
        let value = self.value_from_tokens(&tokens[op_idx + 1..]);
        Some(Statement::Predicate {
            keyword,
            subject,
            field,
            operator,
            value,
            span,
        })
    }

    fn parse_mutate(&mut self, tokens: &[Token]) -> Option<Statement> {
        let span = self.line_span(tokens, &tokens[0].span);
        if tokens.len() < 4 {
            self.error_here("mutate <target> <id> (+=|-=) <value>");
            return None;
        }
        let target = tokens[1].lexeme.clone();
        let id = tokens[2].lexeme.clone();
        let operator = match tokens[3].kind {
            TokenKind::PlusEq => MutateOp::Add,
            TokenKind::MinusEq => MutateOp::Sub,
            _ => {
                self.error_here("+= or -=");
                return None;
            }
        };
        let value = self.value_from_tokens(&tokens[4..]);
        Some(Statement::Mutate {
            target,
            id,
            operator,
            value,
            span,
        })
    }

    fn parse_rel(&mut self, tokens: &[Token]) -> Option<Statement> {
        let span = self.line_span(tokens, &tokens[0].span);
        let arrow_idx = tokens.iter().position(|t| t.kind == TokenKind::Arrow);
        let Some(arrow_idx) = arrow_idx else {
            self.error_here("rel <kind> <src> -> <dst>");
            return None;
        };
        if arrow_idx < 3 {
            self.error_here("rel <kind> <src> -> <dst>");
            return None;
        }
        let kind = tokens[1].lexeme.clone();
        let src = tokens[arrow_idx - 1].lexeme.clone();
        let dst_and_rest = &tokens[arrow_idx + 1..];
        if dst_and_rest.is_empty() {
            self.error_here("a relationship destination");
            return None;
        }
        let dst = dst_and_rest[0].lexeme.clone();
        let value = self.value_from_tokens(&dst_and_rest[1..]);
        Some(Statement::Rel {
            kind,
            src,
            dst,
            value,
            span,
        })
    }

    fn parse_from(&mut self, tokens: &[Token]) -> Option<Statement> {
        let span = self.line_span(tokens, &tokens[0].span);
        if tokens.len() < 2 {
            self.error_here("from <source>");
            return None;
        }
        let source = tokens[1].lexeme.clone();
        let mut relationship = None;
        let mut direction = None;
        let mut i = 2;
        while i < tokens.len() {
            match tokens[i].lexeme.as_str() {
                "via" if i + 1 < tokens.len() => {
                    relationship = Some(tokens[i + 1].lexeme.clone());
                    i += 2;
                }
                "in" | "out" | "both" => {
                    direction = Some(tokens[i].lexeme.clone());
                    i += 1;
                }
                _ => i += 1,
            }
        }
        Some(Statement::From {
            source,
            relationship,
            direction,
            span,
        })
    }
}

/// Parses a single Canon source file into its top-level statements.
pub fn parse_file(file: impl Into<String>, source: &str) -> (Vec<Statement>, Vec<ParseError>) {
    Parser::new(file, source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<Statement> {
        let (stmts, errors) = parse_file("t.canon", src);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        stmts
    }

    #[test]
    fn parses_simple_block() {
        let stmts = parse("project \"p\" do\nname: \"Demo\"\nend\n");
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Statement::Block { name, labels, body, .. } => {
                assert_eq!(name, "project");
                assert_eq!(labels, &vec!["p".to_string()]);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn parses_colon_attribute() {
        let stmts = parse("name: \"Demo\"\n");
        match &stmts[0] {
            Statement::Attribute { key, value, .. } => {
                assert_eq!(key, "name");
                assert_eq!(value, &Value::String("Demo".to_string()));
            }
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn parses_arrow_axis_poles() {
        let stmts = parse("axis moral \"Moral Axis\" good -> evil\n");
        match &stmts[0] {
            Statement::Attribute { key, labels, value, .. } => {
                assert_eq!(key, "axis");
                assert_eq!(labels, &vec!["moral".to_string()]);
                assert_eq!(
                    value,
                    &Value::Array(vec![
                        Value::String("Moral Axis".to_string()),
                        Value::Identifier("good".to_string()),
                        Value::Identifier("->".to_string()),
                        Value::Identifier("evil".to_string())
                    ])
                );
            }
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn parses_predicate() {
        let stmts = parse("pressure p >= 3\n");
        match &stmts[0] {
            Statement::Predicate {
                keyword,
                subject,
                operator,
                value,
                ..
            } => {
                assert_eq!(keyword, "pressure");
                assert_eq!(subject, "p");
                assert_eq!(*operator, Operator::Ge);
                assert_eq!(value, &Value::Number(3.0));
            }
            other => panic!("expected predicate, got {other:?}"),
        }
    }

    #[test]
    fn parses_in_statement() {
        let stmts = parse("status in [alive dead]\n");
        match &stmts[0] {
            Statement::In { key, items, .. } => {
                assert_eq!(key, "status");
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected in-statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_mutate() {
        let stmts = parse("mutate pressure p += 1\n");
        match &stmts[0] {
            Statement::Mutate { target, id, operator, value, .. } => {
                assert_eq!(target, "pressure");
                assert_eq!(id, "p");
                assert_eq!(*operator, MutateOp::Add);
                assert_eq!(value, &Value::Number(1.0));
            }
            other => panic!("expected mutate, got {other:?}"),
        }
    }

    #[test]
    fn parses_rel() {
        let stmts = parse("rel friend_of $a -> $b strength: 0.5\n");
        match &stmts[0] {
            Statement::Rel { kind, src, dst, value, .. } => {
                assert_eq!(kind, "friend_of");
                assert_eq!(src, "$a");
                assert_eq!(dst, "$b");
                assert!(value.as_object().is_some());
            }
            other => panic!("expected rel, got {other:?}"),
        }
    }

    #[test]
    fn parses_from_with_via_and_direction() {
        let stmts = parse("from $x via friend_of out\n");
        match &stmts[0] {
            Statement::From { source, relationship, direction, .. } => {
                assert_eq!(source, "$x");
                assert_eq!(relationship.as_deref(), Some("friend_of"));
                assert_eq!(direction.as_deref(), Some("out"));
            }
            other => panic!("expected from, got {other:?}"),
        }
    }

    #[test]
    fn parses_object_literal_value() {
        let stmts = parse("meta: { a: 1, b: \"x\" }\n");
        match &stmts[0] {
            Statement::Attribute { value, .. } => {
                let obj = value.as_object().expect("object value");
                assert_eq!(obj.len(), 2);
            }
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn parses_call_value() {
        let stmts = parse("id: coalesce(a, b)\n");
        match &stmts[0] {
            Statement::Attribute { value, .. } => {
                assert!(value.is_call());
            }
            other => panic!("expected attribute, got {other:?}"),
        }
    }
}
