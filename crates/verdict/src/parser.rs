//! Recursive-descent parser over the filtered token stream
//!
//! Precedence, low to high: `or`, `and`, equality and membership
//! (`==` `!=` `includes` `matches` `in`), comparison, additive,
//! multiplicative, unary, time measurement, ornament chain, primary.
//!
//! Inspect markers: every `?` bumps a pending counter; the next
//! non-literal node to complete claims one. Literals never take markers,
//! so `1 + 2?` marks the addition while `$x? + 1` marks the variable.
//!
//! Parse errors are fatal. The parser recovers to the next line end so a
//! single pass reports every error, then returns them all.

use crate::ast::{
    AssignOp, BinaryOp, Direction, Literal, LogicalOp, MetaKind, NodeKind, RegexLiteral, Span,
    SyntaxNode, TakeBinding, UnaryOp,
};
use crate::error::{ParseError, VerdictError};
use crate::lexer::{Token, TokenKind};
use crate::value::DurationUnit;

/// Parse a filtered token stream into program statements.
pub fn parse_tokens(tokens: &[Token]) -> Result<Vec<SyntaxNode>, VerdictError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        errors: Vec::new(),
        pending_qmarks: 0,
    };
    let roots = parser.program();
    if parser.errors.is_empty() {
        Ok(roots)
    } else {
        Err(VerdictError::Parse(parser.errors))
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    errors: Vec<ParseError>,
    pending_qmarks: usize,
}

type PResult = Result<SyntaxNode, ParseError>;

impl<'a> Parser<'a> {
    // ═══════════════════════════════════════════════════════════════════
    // Token Plumbing
    // ═══════════════════════════════════════════════════════════════════

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_at(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == kind {
            Some(self.advance())
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.err_here(format!("Expected {what}")))
        }
    }

    fn err_here(&self, message: String) -> ParseError {
        ParseError {
            message,
            offset: self.peek().offset,
        }
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end()
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end())
    }

    /// Consume pending `?` markers at the current position.
    fn eat_qmarks(&mut self) {
        while self.eat(TokenKind::Question).is_some() {
            self.pending_qmarks += 1;
        }
    }

    /// A non-literal node just completed; let it claim one marker.
    fn finish(&mut self, mut node: SyntaxNode) -> SyntaxNode {
        if self.pending_qmarks > 0 && !node.is_literal() {
            node.inspect = true;
            self.pending_qmarks -= 1;
        }
        node
    }

    fn skip_eols(&mut self) {
        while self.eat(TokenKind::Eol).is_some() {}
    }

    // ═══════════════════════════════════════════════════════════════════
    // Program and Statements
    // ═══════════════════════════════════════════════════════════════════

    fn program(&mut self) -> Vec<SyntaxNode> {
        let mut statements = Vec::new();
        self.skip_eols();
        while self.peek_kind() != TokenKind::Eof {
            match self.statement() {
                Ok(node) => statements.push(node),
                Err(e) => {
                    self.errors.push(e);
                    self.recover();
                }
            }
            if self.peek_kind() != TokenKind::Eof && self.eat(TokenKind::Eol).is_none() {
                self.errors
                    .push(self.err_here(format!("Unexpected token {:?}", self.peek().lexeme)));
                self.recover();
            }
            self.skip_eols();
        }
        statements
    }

    /// Skip to the next line end so later statements still get checked.
    fn recover(&mut self) {
        while !matches!(self.peek_kind(), TokenKind::Eol | TokenKind::Eof) {
            self.advance();
        }
        self.skip_eols();
    }

    fn statement(&mut self) -> PResult {
        let node = match self.peek_kind() {
            TokenKind::Let => self.declare(),
            TokenKind::Define => self.define(),
            TokenKind::Print => self.print_stmt(),
            TokenKind::If => self.if_stmt(),
            TokenKind::Each => self.each_stmt(),
            TokenKind::Take => self.take_stmt(),
            TokenKind::Validate => self.validate_stmt(),
            TokenKind::Reject => self.reject_stmt(),
            TokenKind::Skip => {
                let token = self.advance();
                Ok(SyntaxNode::new(
                    NodeKind::Skip,
                    Span::new(token.offset, token.end()),
                ))
            }
            TokenKind::Identifier if self.is_assignment() => self.assign_stmt(),
            _ => self.expression(),
        }?;
        self.eat_qmarks();
        Ok(self.finish(node))
    }

    /// Lookahead: identifier path followed by an assignment operator.
    fn is_assignment(&self) -> bool {
        let mut ahead = 1;
        while self.peek_at(ahead) == TokenKind::Dot
            && self.peek_at(ahead + 1) == TokenKind::Identifier
        {
            ahead += 2;
        }
        matches!(
            self.peek_at(ahead),
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
        )
    }

    fn declare(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // let
        let name = self.expect(TokenKind::Identifier, "a variable name after let")?;
        self.expect(TokenKind::Eq, "= after the variable name")?;
        let init = self.expression()?;
        Ok(SyntaxNode::new(
            NodeKind::Declare {
                name: name.lexeme,
                init: Box::new(init),
            },
            self.span_from(start),
        ))
    }

    fn define(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // define
        let name = self.expect(TokenKind::Ornament, "an ornament name after define")?;
        let body = if self.peek_kind() == TokenKind::CurlyLeft {
            self.block()?
        } else {
            self.expression()?
        };
        Ok(SyntaxNode::new(
            NodeKind::Define {
                name: name.lexeme.trim_start_matches(':').to_string(),
                body: Box::new(body),
            },
            self.span_from(start),
        ))
    }

    fn print_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // print
        let expr = self.expression()?;
        Ok(SyntaxNode::new(
            NodeKind::Print(Box::new(expr)),
            self.span_from(start),
        ))
    }

    fn if_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // if
        let cond = self.expression()?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(TokenKind::Else).is_some() {
            let node = if self.peek_kind() == TokenKind::If {
                self.if_stmt()?
            } else {
                self.block()?
            };
            Some(Box::new(node))
        } else {
            None
        };
        Ok(SyntaxNode::new(
            NodeKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            self.span_from(start),
        ))
    }

    fn each_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // each

        // `each $item in <expr>` names the alias first
        if self.peek_kind() == TokenKind::Identifier && self.peek_at(1) == TokenKind::In {
            let alias = self.advance().lexeme;
            self.advance(); // in
            let subject = self.expression()?;
            let body = self.block()?;
            return Ok(SyntaxNode::new(
                NodeKind::Each {
                    subject: Box::new(subject),
                    alias: Some(alias),
                    body: Box::new(body),
                },
                self.span_from(start),
            ));
        }

        let subject = self.expression()?;
        let alias = if self.eat(TokenKind::As).is_some() {
            Some(
                self.expect(TokenKind::Identifier, "an alias after as")?
                    .lexeme,
            )
        } else {
            None
        };
        let body = self.block()?;
        Ok(SyntaxNode::new(
            NodeKind::Each {
                subject: Box::new(subject),
                alias,
                body: Box::new(body),
            },
            self.span_from(start),
        ))
    }

    fn take_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // take
        let mut bindings = Vec::new();
        if self.eat(TokenKind::CurlyLeft).is_some() {
            loop {
                self.skip_eols();
                bindings.push(self.take_binding()?);
                self.skip_eols();
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.skip_eols();
            self.expect(TokenKind::CurlyRight, "} after take bindings")?;
        } else {
            bindings.push(self.take_binding()?);
        }
        let source = if self.eat(TokenKind::From).is_some() {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        Ok(SyntaxNode::new(
            NodeKind::Take { bindings, source },
            self.span_from(start),
        ))
    }

    fn take_binding(&mut self) -> Result<TakeBinding, ParseError> {
        let first = self.expect(TokenKind::Identifier, "a field to take")?;
        let mut path = vec![first.lexeme];
        while self.peek_kind() == TokenKind::Dot && self.peek_at(1) == TokenKind::Identifier {
            self.advance();
            path.push(self.advance().lexeme);
        }
        let alias = if self.eat(TokenKind::As).is_some() {
            Some(
                self.expect(TokenKind::Identifier, "an alias after as")?
                    .lexeme,
            )
        } else {
            None
        };
        Ok(TakeBinding { path, alias })
    }

    fn validate_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // validate
        let label = if self.peek_kind() != TokenKind::CurlyLeft {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.expect(TokenKind::CurlyLeft, "{ after validate")?;
        let body = self.statements_until_brace()?;
        Ok(SyntaxNode::new(
            NodeKind::Validate { label, body },
            self.span_from(start),
        ))
    }

    fn reject_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // reject
        let subject = self.expression()?;
        let message = if self.eat(TokenKind::Because).is_some() {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        Ok(SyntaxNode::new(
            NodeKind::Reject {
                message,
                subject: Box::new(subject),
            },
            self.span_from(start),
        ))
    }

    fn assign_stmt(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut target = vec![self.advance().lexeme];
        while self.eat(TokenKind::Dot).is_some() {
            target.push(
                self.expect(TokenKind::Identifier, "a field name after .")?
                    .lexeme,
            );
        }
        let op = match self.peek_kind() {
            TokenKind::Eq => AssignOp::Set,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            _ => return Err(self.err_here("Expected an assignment operator".to_string())),
        };
        self.advance();
        let value = self.expression()?;
        Ok(SyntaxNode::new(
            NodeKind::Assign {
                op,
                target,
                value: Box::new(value),
            },
            self.span_from(start),
        ))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    fn expression(&mut self) -> PResult {
        self.or_expr()
    }

    fn or_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.and_expr()?;
        while self.eat(TokenKind::Or).is_some() {
            let rhs = self.and_expr()?;
            node = SyntaxNode::new(
                NodeKind::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn and_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.equality_expr()?;
        while self.eat(TokenKind::And).is_some() {
            let rhs = self.equality_expr()?;
            node = SyntaxNode::new(
                NodeKind::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn equality_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.comparison_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                TokenKind::Includes => BinaryOp::Includes,
                TokenKind::Matches => BinaryOp::Matches,
                TokenKind::In => BinaryOp::In,
                _ => break,
            };
            self.advance();
            let rhs = if op == BinaryOp::Matches && self.peek_kind() == TokenKind::Regex {
                self.regex_literal()?
            } else {
                self.comparison_expr()?
            };
            node = SyntaxNode::new(
                NodeKind::Binary {
                    op,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn comparison_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.additive_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gte => BinaryOp::Ge,
                TokenKind::Lte => BinaryOp::Le,
                _ => break,
            };
            self.advance();
            let rhs = self.additive_expr()?;
            node = SyntaxNode::new(
                NodeKind::Binary {
                    op,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn additive_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.multiplicative_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative_expr()?;
            node = SyntaxNode::new(
                NodeKind::Binary {
                    op,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn multiplicative_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary_expr()?;
            node = SyntaxNode::new(
                NodeKind::Binary {
                    op,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn unary_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let op = match self.peek_kind() {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary_expr()?;
            let node = SyntaxNode::new(
                NodeKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            return Ok(self.finish(node));
        }
        self.measurement_expr()
    }

    /// `<expr> <unit>` with an optional `ago`/`ahead` suffix.
    fn measurement_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.postfix_expr()?;
        if self.peek_kind() == TokenKind::Unit {
            let unit_token = self.advance();
            let unit = DurationUnit::from_lexeme(&unit_token.lexeme)
                .ok_or_else(|| self.err_here("Unknown duration unit".to_string()))?;
            node = SyntaxNode::new(
                NodeKind::Measurement {
                    value: Box::new(node),
                    unit,
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);

            let direction = match self.peek_kind() {
                TokenKind::Ago => Some(Direction::Ago),
                TokenKind::Ahead => Some(Direction::Ahead),
                _ => None,
            };
            if let Some(direction) = direction {
                self.advance();
                node = SyntaxNode::new(
                    NodeKind::RelativeDate {
                        measurement: Box::new(node),
                        direction,
                    },
                    self.span_from(start),
                );
                self.eat_qmarks();
                node = self.finish(node);
            }
        }
        Ok(node)
    }

    /// A primary expression with its ornament chain.
    fn postfix_expr(&mut self) -> PResult {
        let start = self.peek().offset;
        let mut node = self.primary()?;
        if self.peek_kind() == TokenKind::Ornament {
            let mut names = Vec::new();
            while self.peek_kind() == TokenKind::Ornament {
                let token = self.advance();
                names.push((
                    token.lexeme.trim_start_matches(':').to_string(),
                    Span::new(token.offset, token.end()),
                ));
            }
            node = SyntaxNode::new(
                NodeKind::Ornament {
                    subject: Box::new(node),
                    names,
                },
                self.span_from(start),
            );
            self.eat_qmarks();
            node = self.finish(node);
        }
        Ok(node)
    }

    fn primary(&mut self) -> PResult {
        let token = self.peek().clone();
        let span = Span::new(token.offset, token.end());
        let node = match token.kind {
            TokenKind::Number => {
                self.advance();
                let text: String = token.lexeme.chars().filter(|c| *c != '_').collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| self.err_here(format!("Invalid number {:?}", token.lexeme)))?;
                SyntaxNode::new(NodeKind::Literal(Literal::Number(n)), span)
            }
            TokenKind::Str => {
                self.advance();
                let decoded = decode_string(&token.lexeme)
                    .ok_or_else(|| self.err_here("Invalid string escape".to_string()))?;
                SyntaxNode::new(NodeKind::Literal(Literal::String(decoded)), span)
            }
            TokenKind::True => {
                self.advance();
                SyntaxNode::new(NodeKind::Literal(Literal::Boolean(true)), span)
            }
            TokenKind::False => {
                self.advance();
                SyntaxNode::new(NodeKind::Literal(Literal::Boolean(false)), span)
            }
            TokenKind::Regex => self.regex_literal()?,
            TokenKind::Now | TokenKind::Today => {
                self.advance();
                SyntaxNode::new(NodeKind::DateNow, span)
            }
            TokenKind::Index => {
                self.advance();
                SyntaxNode::new(NodeKind::Meta(MetaKind::Index), span)
            }
            TokenKind::This => {
                self.advance();
                SyntaxNode::new(NodeKind::Meta(MetaKind::This), span)
            }
            TokenKind::Identifier => {
                let start = token.offset;
                let mut path = vec![self.advance().lexeme];
                while self.peek_kind() == TokenKind::Dot
                    && self.peek_at(1) == TokenKind::Identifier
                {
                    self.advance();
                    path.push(self.advance().lexeme);
                }
                SyntaxNode::new(NodeKind::Variable(path), self.span_from(start))
            }
            TokenKind::ParenLeft => {
                let start = token.offset;
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::ParenRight, ") to close the grouping")?;
                SyntaxNode::new(NodeKind::Grouping(Box::new(inner)), self.span_from(start))
            }
            TokenKind::CurlyLeft => return self.block_or_collection(),
            TokenKind::Ornament => {
                return Err(self.err_here(format!(
                    "Ornament {} has nothing to apply to",
                    token.lexeme
                )))
            }
            _ => {
                return Err(self.err_here(format!(
                    "Unexpected token {:?}",
                    if token.kind == TokenKind::Eof {
                        "end of input".to_string()
                    } else {
                        token.lexeme.clone()
                    }
                )))
            }
        };
        self.eat_qmarks();
        Ok(self.finish(node))
    }

    fn regex_literal(&mut self) -> PResult {
        let token = self.expect(TokenKind::Regex, "a regex literal")?;
        let span = Span::new(token.offset, token.end());
        let body = &token.lexeme[1..];
        let close = body
            .rfind('/')
            .ok_or_else(|| self.err_here("Malformed regex literal".to_string()))?;
        let pattern = body[..close].replace("\\/", "/");
        let flags = body[close + 1..].to_string();
        let compiled = regex::RegexBuilder::new(&pattern)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .ignore_whitespace(flags.contains('x'))
            .build()
            .map_err(|e| ParseError {
                message: format!("Invalid regex: {e}"),
                offset: span.start,
            })?;
        Ok(SyntaxNode::new(
            NodeKind::Literal(Literal::Regex(RegexLiteral {
                pattern,
                flags,
                compiled,
            })),
            span,
        ))
    }

    /// `{ ... }`: a collection when a comma separates the first two
    /// elements, a block otherwise.
    fn block_or_collection(&mut self) -> PResult {
        let start = self.peek().offset;
        self.advance(); // {
        self.skip_eols();
        if self.eat(TokenKind::CurlyRight).is_some() {
            let node = SyntaxNode::new(NodeKind::Block(Vec::new()), self.span_from(start));
            self.eat_qmarks();
            return Ok(self.finish(node));
        }

        let first = self.statement()?;
        if self.peek_kind() == TokenKind::Comma {
            let mut items = vec![first];
            while self.eat(TokenKind::Comma).is_some() {
                self.skip_eols();
                items.push(self.expression()?);
                self.skip_eols();
            }
            self.expect(TokenKind::CurlyRight, "} to close the collection")?;
            let node = SyntaxNode::new(NodeKind::Collection(items), self.span_from(start));
            self.eat_qmarks();
            return Ok(self.finish(node));
        }

        let mut statements = vec![first];
        loop {
            self.skip_eols();
            if self.eat(TokenKind::CurlyRight).is_some() {
                break;
            }
            if self.peek_kind() == TokenKind::Eof {
                return Err(self.err_here("Expected } to close the block".to_string()));
            }
            statements.push(self.statement()?);
        }
        let node = SyntaxNode::new(NodeKind::Block(statements), self.span_from(start));
        self.eat_qmarks();
        Ok(self.finish(node))
    }

    /// A `{ ... }` that must be a block (loop bodies, branches).
    fn block(&mut self) -> PResult {
        if self.peek_kind() != TokenKind::CurlyLeft {
            return Err(self.err_here("Expected {".to_string()));
        }
        let node = self.block_or_collection()?;
        match node.kind {
            NodeKind::Block(_) => Ok(node),
            _ => Err(ParseError {
                message: "Expected a block, found a collection".to_string(),
                offset: node.span.start,
            }),
        }
    }

    fn statements_until_brace(&mut self) -> Result<Vec<SyntaxNode>, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_eols();
            if self.eat(TokenKind::CurlyRight).is_some() {
                return Ok(statements);
            }
            if self.peek_kind() == TokenKind::Eof {
                return Err(self.err_here("Expected } to close the validate block".to_string()));
            }
            statements.push(self.statement()?);
        }
    }
}

fn decode_string(lexeme: &str) -> Option<String> {
    let body = lexeme.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Scan and parse source text. Lexical errors are fatal here; callers
/// that tolerate them scan and parse separately.
pub fn parse_source(source: &str) -> Result<Vec<SyntaxNode>, VerdictError> {
    let (tokens, lex_errors) = crate::lexer::scan(source);
    if !lex_errors.is_empty() {
        return Err(VerdictError::Lex(lex_errors));
    }
    parse_tokens(&tokens)
}
