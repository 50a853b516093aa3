//! Recursive-descent predictive parser over the scanned token sequence.
//!
//! Each grammar rule is one method.  A parse error inside a declaration is
//! recorded and the parser synchronizes to the next statement boundary, so a
//! single pass can report several syntax errors.  `for` loops are desugared
//! here into `while` wrapped in blocks; the later passes never see them.

use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FuncDecl, Lit, Stmt};
use crate::error::JazzError;
use crate::token::{Token, TokenType};

const MAX_CALL_ARGS: usize = 254;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<JazzError>,
    next_id: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            next_id: 0,
        }
    }

    /// Starts node-id assignment at `base` instead of zero.
    ///
    /// A REPL session parses many chunks against one interpreter, whose
    /// side-table outlives each chunk; ids must never repeat across them.
    pub fn with_base_id(mut self, base: usize) -> Self {
        self.next_id = base;
        self
    }

    /// First id this parser has not handed out.
    pub fn id_watermark(&self) -> usize {
        self.next_id
    }

    /// Parses the whole token sequence.  `Err` carries every syntax error
    /// found; the statements parsed so far are discarded because the chunk
    /// must not run.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, Vec<JazzError>> {
        info!("Parsing {} token(s)", self.tokens.len());

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    debug!("Parse error, synchronizing: {}", e);
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(mem::take(&mut self.errors))
        }
    }

    fn new_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn declaration(&mut self) -> Result<Stmt, JazzError> {
        if self.match_tokens(&[TokenType::LET]) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn statement(&mut self) -> Result<Stmt, JazzError> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::FN]) {
            return self.function();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    fn var_declaration(&mut self) -> Result<Stmt, JazzError> {
        let name = self
            .consume(&TokenType::IDENTIFIER, "expected variable name")?
            .clone();

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            &TokenType::SEMICOLON,
            "expected ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn function(&mut self) -> Result<Stmt, JazzError> {
        let name = self
            .consume(&TokenType::IDENTIFIER, "expected function name")?
            .clone();

        self.consume(&TokenType::LEFT_PAREN, "expected '(' after function name")?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_CALL_ARGS {
                    let line = self.peek().line;
                    self.errors.push(JazzError::parse(
                        line,
                        "cannot have more than 255 parameters",
                    ));
                }

                let param = self
                    .consume(&TokenType::IDENTIFIER, "expected parameter name")?
                    .clone();
                params.push(param);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(&TokenType::RIGHT_PAREN, "expected ')' after parameters")?;
        self.consume(&TokenType::LEFT_BRACE, "expected '{' before function body")?;

        let body = self.block()?;

        Ok(Stmt::Func(Rc::new(FuncDecl { name, params, body })))
    }

    fn for_statement(&mut self) -> Result<Stmt, JazzError> {
        self.consume(&TokenType::LEFT_PAREN, "expected '(' after 'for'")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::LET]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::SEMICOLON, "expected ';' after loop condition")?;

        // Lookahead only: the closing ')' is consumed exactly once below,
        // whether or not an increment is present.
        let increment: Option<Expr> = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::RIGHT_PAREN, "expected ')' after for clauses")?;

        let mut body = self.statement()?;

        // Desugar into: { initializer; while (condition) { body; increment; } }
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expr(increment)]);
        }

        let condition = condition.unwrap_or(Expr::Literal(Lit::Bool(true)));

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, JazzError> {
        self.consume(&TokenType::LEFT_PAREN, "expected '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "expected ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, JazzError> {
        let value = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "expected ';' after value")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt, JazzError> {
        let keyword = self.previous().clone();

        let value = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::SEMICOLON, "expected ';' after return value")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, JazzError> {
        self.consume(&TokenType::LEFT_PAREN, "expected '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "expected ')' after condition")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn expression_statement(&mut self) -> Result<Stmt, JazzError> {
        let expr = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "expected ';' after expression")?;
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, JazzError> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(&TokenType::RIGHT_BRACE, "expected '}' after block")?;

        Ok(statements)
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, JazzError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, JazzError> {
        let expr = self.or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            if let Expr::Variable { name, .. } = expr {
                return Ok(Expr::Assign {
                    id: self.new_id(),
                    name,
                    value: Box::new(value),
                });
            }

            return Err(JazzError::parse(equals.line, "invalid assignment target"));
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, JazzError> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, JazzError> {
        let mut expr = self.primary()?;

        while self.match_tokens(&[TokenType::LEFT_PAREN]) {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, JazzError> {
        let mut args: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if args.len() >= MAX_CALL_ARGS {
                    let line = self.peek().line;
                    self.errors
                        .push(JazzError::parse(line, "cannot have more than 255 arguments"));
                }

                args.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self
            .consume(&TokenType::RIGHT_PAREN, "expected ')' after arguments")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            args,
        })
    }

    fn primary(&mut self) -> Result<Expr, JazzError> {
        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(Lit::Bool(false)));
        }

        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(Lit::Bool(true)));
        }

        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(Lit::Nil));
        }

        if self.match_tokens(&[TokenType::NUMBER(0.0)]) {
            if let TokenType::NUMBER(n) = &self.previous().token_type {
                return Ok(Expr::Literal(Lit::Number(*n)));
            }
            unreachable!("matched NUMBER token without numeric payload");
        }

        if self.match_tokens(&[TokenType::STRING(String::new())]) {
            if let TokenType::STRING(s) = &self.previous().token_type {
                return Ok(Expr::Literal(Lit::Str(s.clone())));
            }
            unreachable!("matched STRING token without string payload");
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: self.new_id(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(&TokenType::RIGHT_PAREN, "expected ')' after expression")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(JazzError::parse(self.peek().line, "expected an expression"))
    }

    // ── Machinery ───────────────────────────────────────────────────────

    /// Discards tokens until a statement boundary, so one syntax error does
    /// not cascade into the declarations that follow it.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::FOR
                | TokenType::FN
                | TokenType::IF
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::LET
                | TokenType::WHILE => return,

                _ => {
                    self.advance();
                }
            }
        }
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) -> Result<&Token, JazzError> {
        if self.check(token_type) {
            return Ok(self.advance());
        }

        Err(JazzError::parse(self.peek().line, message))
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}
