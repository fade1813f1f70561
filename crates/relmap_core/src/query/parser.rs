//! Query text parsing.
//!
//! The language is a small entity query dialect: `SELECT` with an entity
//! or field projection, `FROM entity [alias]`, `WHERE` with comparisons,
//! `IS NULL`, `LIKE`, and boolean connectives, `ORDER BY`, plus bulk
//! `UPDATE ... SET` and `DELETE`. Keywords are case-insensitive; a bare
//! `FROM entity` selects whole entities. Parameters are positional
//! (`?1`, or bare `?` numbered left to right) or named (`:name`).

use crate::error::{CoreError, CoreResult};
use crate::query::ast::{
    CompareOp, DeleteStatement, Expr, Operand, OrderBy, Projection, SelectStatement, Statement,
    UpdateStatement,
};
use relmap_schema::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Positional(usize),
    Named(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Dot,
}

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER", "BY", "ASC", "DESC", "AND", "OR", "NOT", "IS", "NULL",
    "LIKE", "UPDATE", "SET", "DELETE", "TRUE", "FALSE", "AS",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn tokenize(text: &str) -> CoreResult<Vec<(usize, Token)>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut next_positional = 1usize;

    while i < bytes.len() {
        // i only ever lands on a char boundary: every arm below advances
        // past whole characters, and string literals are sliced at the
        // ASCII quote.
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        let start = i;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push((start, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((start, Token::RParen));
                i += 1;
            }
            ',' => {
                tokens.push((start, Token::Comma));
                i += 1;
            }
            '.' => {
                tokens.push((start, Token::Dot));
                i += 1;
            }
            '=' => {
                tokens.push((start, Token::Eq));
                i += 1;
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'>') {
                    tokens.push((start, Token::Ne));
                    i += 2;
                } else if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((start, Token::Le));
                    i += 2;
                } else {
                    tokens.push((start, Token::Lt));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((start, Token::Ge));
                    i += 2;
                } else {
                    tokens.push((start, Token::Gt));
                    i += 1;
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((start, Token::Ne));
                    i += 2;
                } else {
                    return Err(CoreError::parse("unexpected '!'", start));
                }
            }
            '?' => {
                i += 1;
                let digits_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i > digits_start {
                    let n: usize = text[digits_start..i]
                        .parse()
                        .map_err(|_| CoreError::parse("invalid parameter number", start))?;
                    tokens.push((start, Token::Positional(n)));
                } else {
                    tokens.push((start, Token::Positional(next_positional)));
                    next_positional += 1;
                }
            }
            ':' => {
                i += 1;
                let name_start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                if i == name_start {
                    return Err(CoreError::parse("expected a parameter name after ':'", start));
                }
                tokens.push((start, Token::Named(text[name_start..i].to_string())));
            }
            '\'' => {
                i += 1;
                let mut value = String::new();
                loop {
                    // The quote byte never occurs inside a multi-byte
                    // UTF-8 sequence, so scanning bytes and slicing the
                    // text between quotes keeps literals intact.
                    match bytes[i..].iter().position(|&b| b == b'\'') {
                        None => return Err(CoreError::parse("unterminated string", start)),
                        Some(offset) => {
                            value.push_str(&text[i..i + offset]);
                            i += offset;
                            // '' escapes a quote inside the string
                            if bytes.get(i + 1) == Some(&b'\'') {
                                value.push('\'');
                                i += 2;
                            } else {
                                i += 1;
                                break;
                            }
                        }
                    }
                }
                tokens.push((start, Token::Str(value)));
            }
            '-' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let n: i64 = text[start..i]
                    .parse()
                    .map_err(|_| CoreError::parse("integer literal out of range", start))?;
                tokens.push((start, Token::Int(n)));
            }
            _ if c.is_ascii_digit() => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let n: i64 = text[start..i]
                    .parse()
                    .map_err(|_| CoreError::parse("integer literal out of range", start))?;
                tokens.push((start, Token::Int(n)));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push((start, Token::Ident(text[start..i].to_string())));
            }
            _ => return Err(CoreError::parse(format!("unexpected character '{c}'"), start)),
        }
    }
    Ok(tokens)
}

/// Parses one statement.
pub(crate) fn parse(text: &str) -> CoreResult<Statement> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: text.len(),
        alias: None,
    };
    let statement = parser.statement()?;
    if let Some((at, _)) = parser.tokens.get(parser.pos) {
        return Err(CoreError::parse("trailing input after statement", *at));
    }
    Ok(statement)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    alias: Option<String>,
}

impl Parser {
    fn statement(&mut self) -> CoreResult<Statement> {
        if self.peek_keyword("SELECT") || self.peek_keyword("FROM") {
            self.select().map(Statement::Select)
        } else if self.peek_keyword("UPDATE") {
            self.update().map(Statement::Update)
        } else if self.peek_keyword("DELETE") {
            self.delete().map(Statement::Delete)
        } else {
            Err(self.error_here("expected SELECT, FROM, UPDATE, or DELETE"))
        }
    }

    fn select(&mut self) -> CoreResult<SelectStatement> {
        let mut raw_paths: Vec<(usize, String, Option<String>)> = Vec::new();
        if self.eat_keyword("SELECT") {
            loop {
                let at = self.here();
                let (head, tail) = self.raw_path()?;
                raw_paths.push((at, head, tail));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect_keyword("FROM")?;
        let entity = self.ident("entity name")?;
        self.entity_alias();

        let projection = self.resolve_projection(raw_paths)?;
        let predicate = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };
        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let field = self.field_path()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderBy { field, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        Ok(SelectStatement {
            entity,
            projection,
            predicate,
            order_by,
        })
    }

    fn update(&mut self) -> CoreResult<UpdateStatement> {
        self.expect_keyword("UPDATE")?;
        let entity = self.ident("entity name")?;
        self.entity_alias();
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let field = self.field_path()?;
            self.expect(&Token::Eq, "'='")?;
            let operand = self.operand()?;
            assignments.push((field, operand));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let predicate = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };
        Ok(UpdateStatement {
            entity,
            assignments,
            predicate,
        })
    }

    fn delete(&mut self) -> CoreResult<DeleteStatement> {
        self.expect_keyword("DELETE")?;
        self.eat_keyword("FROM");
        let entity = self.ident("entity name")?;
        self.entity_alias();
        let predicate = if self.eat_keyword("WHERE") {
            Some(self.or_expr()?)
        } else {
            None
        };
        Ok(DeleteStatement { entity, predicate })
    }

    /// Consumes the optional alias after the entity name.
    fn entity_alias(&mut self) {
        self.eat_keyword("AS");
        if let Some((_, Token::Ident(word))) = self.tokens.get(self.pos) {
            if !is_keyword(word) {
                self.alias = Some(word.clone());
                self.pos += 1;
            }
        }
    }

    fn resolve_projection(
        &self,
        raw_paths: Vec<(usize, String, Option<String>)>,
    ) -> CoreResult<Projection> {
        if raw_paths.is_empty() {
            return Ok(Projection::Entity);
        }
        if raw_paths.len() == 1
            && raw_paths[0].2.is_none()
            && Some(&raw_paths[0].1) == self.alias.as_ref()
        {
            return Ok(Projection::Entity);
        }
        let mut fields = Vec::with_capacity(raw_paths.len());
        for (at, head, tail) in raw_paths {
            match tail {
                Some(name) => {
                    if Some(&head) != self.alias.as_ref() {
                        return Err(CoreError::parse(
                            format!("unknown qualifier '{head}'"),
                            at,
                        ));
                    }
                    fields.push(name);
                }
                None => fields.push(head),
            }
        }
        Ok(Projection::Fields(fields))
    }

    fn or_expr(&mut self) -> CoreResult<Expr> {
        let mut expr = self.and_expr()?;
        while self.eat_keyword("OR") {
            let rhs = self.and_expr()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> CoreResult<Expr> {
        let mut expr = self.unary_expr()?;
        while self.eat_keyword("AND") {
            let rhs = self.unary_expr()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn unary_expr(&mut self) -> CoreResult<Expr> {
        if self.eat_keyword("NOT") {
            let inner = self.unary_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> CoreResult<Expr> {
        let field = self.field_path()?;
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { field, negated });
        }
        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("LIKE") {
            let pattern = self.operand()?;
            return Ok(Expr::Like {
                field,
                pattern,
                negated,
            });
        }
        if negated {
            return Err(self.error_here("expected LIKE after NOT"));
        }
        let op = match self.next() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            _ => return Err(self.error_here("expected a comparison operator")),
        };
        let operand = self.operand()?;
        Ok(Expr::Compare { field, op, operand })
    }

    fn operand(&mut self) -> CoreResult<Operand> {
        if self.eat_keyword("TRUE") {
            return Ok(Operand::Literal(Value::Bool(true)));
        }
        if self.eat_keyword("FALSE") {
            return Ok(Operand::Literal(Value::Bool(false)));
        }
        if self.eat_keyword("NULL") {
            return Ok(Operand::Literal(Value::Null));
        }
        match self.next() {
            Some(Token::Int(n)) => Ok(Operand::Literal(Value::Integer(n))),
            Some(Token::Str(s)) => Ok(Operand::Literal(Value::Text(s))),
            Some(Token::Positional(n)) => Ok(Operand::Positional(n)),
            Some(Token::Named(name)) => Ok(Operand::Named(name)),
            _ => Err(self.error_here("expected a literal or parameter")),
        }
    }

    /// An optionally alias-qualified field; the qualifier is stripped.
    fn field_path(&mut self) -> CoreResult<String> {
        let (head, tail) = self.raw_path()?;
        match tail {
            Some(name) => {
                if Some(&head) != self.alias.as_ref() {
                    return Err(self.error_here(&format!("unknown qualifier '{head}'")));
                }
                Ok(name)
            }
            None => Ok(head),
        }
    }

    fn raw_path(&mut self) -> CoreResult<(String, Option<String>)> {
        let head = self.ident("a field")?;
        if self.eat(&Token::Dot) {
            let tail = self.ident("a field after '.'")?;
            Ok((head, Some(tail)))
        } else {
            Ok((head, None))
        }
    }

    fn ident(&mut self, what: &str) -> CoreResult<String> {
        match self.tokens.get(self.pos) {
            Some((_, Token::Ident(word))) if self.usable_as_name(word) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.error_here(&format!("expected {what}"))),
        }
    }

    /// `ORDER` doubles as a name unless `BY` follows; entities like
    /// `Order` are common.
    fn usable_as_name(&self, word: &str) -> bool {
        if !is_keyword(word) {
            return true;
        }
        word.eq_ignore_ascii_case("ORDER")
            && !matches!(
                self.tokens.get(self.pos + 1),
                Some((_, Token::Ident(next))) if next.eq_ignore_ascii_case("BY")
            )
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(
            self.tokens.get(self.pos),
            Some((_, Token::Ident(word))) if word.eq_ignore_ascii_case(kw)
        )
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> CoreResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {kw}")))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos).map(|(_, t)| t) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> CoreResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Offset of the current token, or end of input.
    fn here(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.end, |(offset, _)| *offset)
    }

    fn error_here(&self, message: &str) -> CoreError {
        CoreError::parse(message, self.here())
    }
}
