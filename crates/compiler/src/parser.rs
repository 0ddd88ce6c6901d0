//! Recursive-descent parser for the Pascal front end
//!
//! One-token lookahead, plus a second peek to disambiguate a statement
//! starting with an identifier (`x := ...` vs a procedure call). The
//! token stream is produced up front; a lexical error aborts before any
//! parsing starts. Operator tokens are converted to the shared
//! `BinaryOp`/`UnaryOp` sums here, exactly once.

use crate::ast::{
    Block, ConstDecl, Decl, Expr, Name, NodeId, Param, ProcDecl, Program, Stmt, TypeSpec, VarDecl,
};
use crate::lexer::{LexError, Lexer};
use crate::token::{Token, TokenKind};
use pas_core::{BinaryOp, UnaryOp, Value};
use std::fmt;

/// Syntax error carrying the offending token.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    fn new(token: &Token, message: impl Into<String>) -> Self {
        ParseError {
            token: token.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at {}: {}", self.token, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Program name used when the `PROGRAM name;` header is omitted.
const DEFAULT_PROGRAM_NAME: &str = "Main";

/// Drain the lexer into a token vector ending with `EOF`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Counter assigning unique ids to expression nodes; the semantic
    /// phase keys its type annotations on these.
    next_id: NodeId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            next_id: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let program = self.program()?;
        if self.current().kind != TokenKind::Eof {
            return Err(self.unexpected("Expected end of input after program terminator"));
        }
        Ok(program)
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn current(&self) -> &Token {
        // tokenize always appends EOF, so the vector is never empty
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        let index = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().kind.same_kind(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!(
                "Expected token {}, but got {}",
                kind.name(),
                self.current().kind.name()
            )))
        }
    }

    fn unexpected(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.current(), message)
    }

    fn name(&mut self) -> Result<Name, ParseError> {
        let token = self.expect(&TokenKind::Id(String::new()))?;
        match token.kind {
            TokenKind::Id(text) => Ok(Name {
                text,
                line: token.line,
                column: token.column,
            }),
            _ => unreachable!("expect(Id) returned a non-identifier"),
        }
    }

    // program := ("PROGRAM" ID ";")? block "."
    fn program(&mut self) -> Result<Program, ParseError> {
        let mut program_name = DEFAULT_PROGRAM_NAME.to_string();
        if self.check(&TokenKind::Program) {
            self.advance();
            program_name = self.name()?.text;
            self.expect(&TokenKind::Semi)?;
        }
        let block = self.block()?;
        self.expect(&TokenKind::Dot)?;
        Ok(Program {
            name: program_name,
            block,
        })
    }

    fn block(&mut self) -> Result<Block, ParseError> {
        let decls = self.declarations()?;
        let body = self.compound_statement()?;
        Ok(Block { decls, body })
    }

    fn declarations(&mut self) -> Result<Vec<Decl>, ParseError> {
        let mut decls = Vec::new();
        loop {
            if self.check(&TokenKind::Var) {
                self.var_part(&mut decls)?;
            } else if self.check(&TokenKind::Const) {
                self.const_part(&mut decls)?;
            } else if self.check(&TokenKind::Procedure) {
                decls.push(Decl::Proc(self.proc_decl()?));
            } else {
                return Ok(decls);
            }
        }
    }

    // var_part := "VAR" var_decl (";" var_decl)*
    fn var_part(&mut self, decls: &mut Vec<Decl>) -> Result<(), ParseError> {
        self.expect(&TokenKind::Var)?;
        if self.check(&TokenKind::Id(String::new())) {
            self.var_decl(decls)?;
            while self.check(&TokenKind::Semi) {
                self.advance();
                if !self.check(&TokenKind::Id(String::new())) {
                    break;
                }
                self.var_decl(decls)?;
            }
        }
        Ok(())
    }

    // var_decl := ID ("," ID)* ":" type_spec
    fn var_decl(&mut self, decls: &mut Vec<Decl>) -> Result<(), ParseError> {
        let mut names = vec![self.name()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.name()?);
        }
        self.expect(&TokenKind::Colon)?;
        let ty = self.type_spec()?;
        for name in names {
            decls.push(Decl::Var(VarDecl {
                name,
                ty: ty.clone(),
            }));
        }
        Ok(())
    }

    // const_part := "CONST" const_decl (";" const_decl)*
    fn const_part(&mut self, decls: &mut Vec<Decl>) -> Result<(), ParseError> {
        self.expect(&TokenKind::Const)?;
        if self.check(&TokenKind::Id(String::new())) {
            decls.push(Decl::Const(self.const_decl()?));
            while self.check(&TokenKind::Semi) {
                self.advance();
                if !self.check(&TokenKind::Id(String::new())) {
                    break;
                }
                decls.push(Decl::Const(self.const_decl()?));
            }
        }
        Ok(())
    }

    // const_decl := ID "=" literal
    fn const_decl(&mut self) -> Result<ConstDecl, ParseError> {
        let name = self.name()?;
        self.expect(&TokenKind::Equal)?;
        let value = self.literal()?;
        Ok(ConstDecl { name, value })
    }

    fn literal(&mut self) -> Result<Value, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::IntConst(n) => {
                self.advance();
                Ok(Value::Int(n))
            }
            TokenKind::RealConst(x) => {
                self.advance();
                Ok(Value::Real(x))
            }
            TokenKind::StrConst(s) => {
                self.advance();
                Ok(Value::Str(s))
            }
            _ => Err(self.unexpected(format!(
                "Expected INTEGER_CONST, REAL_CONST, or STRING_LITERAL for constant value, got {}",
                token.kind.name()
            ))),
        }
    }

    // proc_decl := "PROCEDURE" ID ("(" formal_params ")")? ";" block ";"
    fn proc_decl(&mut self) -> Result<ProcDecl, ParseError> {
        self.expect(&TokenKind::Procedure)?;
        let name = self.name()?;
        let mut params = Vec::new();
        if self.check(&TokenKind::LParen) {
            self.advance();
            if self.check(&TokenKind::Id(String::new())) {
                self.formal_params(&mut params)?;
            }
            self.expect(&TokenKind::RParen)?;
        }
        self.expect(&TokenKind::Semi)?;
        let block = self.block()?;
        self.expect(&TokenKind::Semi)?;
        Ok(ProcDecl {
            name,
            params,
            block,
        })
    }

    // formal_params := param_group (";" param_group)*
    fn formal_params(&mut self, params: &mut Vec<Param>) -> Result<(), ParseError> {
        self.param_group(params)?;
        while self.check(&TokenKind::Semi) {
            self.advance();
            self.param_group(params)?;
        }
        Ok(())
    }

    // param_group := ID ("," ID)* ":" type_spec
    fn param_group(&mut self, params: &mut Vec<Param>) -> Result<(), ParseError> {
        let mut names = vec![self.name()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.name()?);
        }
        self.expect(&TokenKind::Colon)?;
        let ty = self.type_spec()?;
        for name in names {
            params.push(Param {
                name,
                ty: ty.clone(),
            });
        }
        Ok(())
    }

    fn type_spec(&mut self) -> Result<TypeSpec, ParseError> {
        let token = self.current().clone();
        let name = match token.kind {
            TokenKind::Integer => "INTEGER",
            TokenKind::Real => "REAL",
            _ => {
                return Err(self.unexpected(format!(
                    "Expected type specifier (INTEGER or REAL), got {}",
                    token.kind.name()
                )));
            }
        };
        self.advance();
        Ok(TypeSpec {
            name: name.to_string(),
            line: token.line,
            column: token.column,
        })
    }

    // compound_statement := "BEGIN" statement_list "END"
    fn compound_statement(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::Begin)?;
        let statements = self.statement_list()?;
        self.expect(&TokenKind::End)?;
        Ok(statements)
    }

    // statement_list := statement (";" statement)* with a tolerated
    // trailing ";" before END/ELSE
    fn statement_list(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        if !self.check(&TokenKind::End) && !self.check(&TokenKind::Else) {
            statements.push(self.statement()?);
        }
        while self.check(&TokenKind::Semi) {
            self.advance();
            if self.check(&TokenKind::End) || self.check(&TokenKind::Else) {
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.unexpected("Unexpected end of input in statement list"));
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match &self.current().kind {
            TokenKind::Begin => Ok(Stmt::Compound(self.compound_statement()?)),
            TokenKind::Id(_) => {
                // Disambiguate with one extra token of lookahead: an
                // assignment, a call with arguments, or a bare call when a
                // statement terminator follows.
                match &self.peek().kind {
                    TokenKind::Assign => self.assignment(),
                    TokenKind::LParen
                    | TokenKind::Semi
                    | TokenKind::End
                    | TokenKind::Else
                    | TokenKind::Dot => self.procedure_call(),
                    other => Err(self.unexpected(format!(
                        "After an identifier, expected ':=', '(', or a statement terminator, got {}",
                        other.name()
                    ))),
                }
            }
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Read => self.read_statement(),
            TokenKind::Write => self.write_statement(),
            TokenKind::Semi | TokenKind::End | TokenKind::Else | TokenKind::Eof => Ok(Stmt::Empty),
            _ => Err(self.unexpected("Unexpected token at start of statement")),
        }
    }

    // assignment := variable ":=" expr
    fn assignment(&mut self) -> Result<Stmt, ParseError> {
        let target = self.name()?;
        self.expect(&TokenKind::Assign)?;
        let value = self.expr()?;
        Ok(Stmt::Assign { target, value })
    }

    // proc_call := ID ("(" (expr ("," expr)*)? ")")?
    fn procedure_call(&mut self) -> Result<Stmt, ParseError> {
        let name = self.name()?;
        let mut args = Vec::new();
        if self.check(&TokenKind::LParen) {
            self.advance();
            if !self.check(&TokenKind::RParen) {
                args.push(self.expr()?);
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    args.push(self.expr()?);
                }
            }
            self.expect(&TokenKind::RParen)?;
        }
        Ok(Stmt::Call { name, args })
    }

    // if_stmt := "IF" expr "THEN" statement ("ELSE" statement)?
    // ELSE binds to the nearest unmatched THEN.
    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::If)?;
        let cond = self.expr()?;
        self.expect(&TokenKind::Then)?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    // while_stmt := "WHILE" expr "DO" statement
    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::While)?;
        let cond = self.expr()?;
        self.expect(&TokenKind::Do)?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { cond, body })
    }

    // read_stmt := "READ" "(" variable ("," variable)* ")"
    fn read_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::Read)?;
        self.expect(&TokenKind::LParen)?;
        let mut targets = vec![self.name()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            targets.push(self.name()?);
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Stmt::Read { targets })
    }

    // write_stmt := "WRITE" "(" (expr ("," expr)*)? ")"
    fn write_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::Write)?;
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.expr()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.expr()?);
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Stmt::Write { args })
    }

    // expr := or_expr
    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn binary(&mut self, op: BinaryOp, op_token: &Token, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            id: self.fresh_id(),
            op,
            left: Box::new(left),
            right: Box::new(right),
            line: op_token.line,
            column: op_token.column,
        }
    }

    // or_expr := and_expr ("OR" and_expr)*
    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.and_expr()?;
        while self.check(&TokenKind::Or) {
            let op_token = self.advance();
            let right = self.and_expr()?;
            node = self.binary(BinaryOp::Or, &op_token, node, right);
        }
        Ok(node)
    }

    // and_expr := not_expr ("AND" not_expr)*
    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.not_expr()?;
        while self.check(&TokenKind::And) {
            let op_token = self.advance();
            let right = self.not_expr()?;
            node = self.binary(BinaryOp::And, &op_token, node, right);
        }
        Ok(node)
    }

    // not_expr := "NOT" not_expr | cmp_expr
    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            let op_token = self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                id: self.fresh_id(),
                op: UnaryOp::Not,
                operand: Box::new(operand),
                line: op_token.line,
                column: op_token.column,
            });
        }
        self.cmp_expr()
    }

    fn relational_op(kind: &TokenKind) -> Option<BinaryOp> {
        let op = match kind {
            TokenKind::Equal => BinaryOp::Eq,
            TokenKind::NotEqual => BinaryOp::Ne,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::Le,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    // cmp_expr := add_expr (relop add_expr)?  -- non-associative
    fn cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let node = self.add_expr()?;
        if let Some(op) = Self::relational_op(&self.current().kind) {
            let op_token = self.advance();
            let right = self.add_expr()?;
            return Ok(self.binary(op, &op_token, node, right));
        }
        Ok(node)
    }

    // add_expr := mul_expr (("+"|"-") mul_expr)*
    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.mul_expr()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(node),
            };
            let op_token = self.advance();
            let right = self.mul_expr()?;
            node = self.binary(op, &op_token, node, right);
        }
    }

    // mul_expr := primary (("*"|"/"|"DIV") primary)*
    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.primary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Div => BinaryOp::IntDiv,
                _ => return Ok(node),
            };
            let op_token = self.advance();
            let right = self.primary()?;
            node = self.binary(op, &op_token, node, right);
        }
    }

    // primary := ("+"|"-") primary | constants | "(" expr ")" | variable
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Plus | TokenKind::Minus => {
                let op = if token.kind == TokenKind::Plus {
                    UnaryOp::Plus
                } else {
                    UnaryOp::Neg
                };
                self.advance();
                let operand = self.primary()?;
                Ok(Expr::Unary {
                    id: self.fresh_id(),
                    op,
                    operand: Box::new(operand),
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::IntConst(n) => {
                self.advance();
                Ok(Expr::Num {
                    id: self.fresh_id(),
                    value: Value::Int(n),
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::RealConst(x) => {
                self.advance();
                Ok(Expr::Num {
                    id: self.fresh_id(),
                    value: Value::Real(x),
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::StrConst(s) => {
                self.advance();
                Ok(Expr::Str {
                    id: self.fresh_id(),
                    value: s,
                    line: token.line,
                    column: token.column,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let node = self.expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(node)
            }
            TokenKind::Id(_) => {
                let name = self.name()?;
                Ok(Expr::Var {
                    id: self.fresh_id(),
                    name,
                })
            }
            _ => Err(self.unexpected("Unexpected token in expression")),
        }
    }
}

/// Lex and parse a source string in one call.
pub fn parse_source(source: &str) -> Result<Program, ParseError> {
    // Used by tests and dump commands; the pipeline driver lexes
    // separately so the two error categories stay distinct.
    let tokens = tokenize(source).map_err(|e| ParseError {
        token: Token::new(TokenKind::Eof, e.line, e.column),
        message: e.to_string(),
    })?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse_source(source).unwrap()
    }

    #[test]
    fn test_minimal_program() {
        let program = parse_ok("PROGRAM P; BEGIN END.");
        assert_eq!(program.name, "P");
        assert!(program.block.decls.is_empty());
        assert!(program.block.body.is_empty());
    }

    #[test]
    fn test_program_header_is_optional() {
        let program = parse_ok("BEGIN END.");
        assert_eq!(program.name, "Main");
    }

    #[test]
    fn test_var_declarations_expand_name_lists() {
        let program = parse_ok("VAR a, b: INTEGER; c: REAL; BEGIN END.");
        let names: Vec<(&str, &str)> = program
            .block
            .decls
            .iter()
            .map(|d| match d {
                Decl::Var(v) => (v.name.text.as_str(), v.ty.name.as_str()),
                _ => panic!("expected VarDecl"),
            })
            .collect();
        assert_eq!(
            names,
            vec![("a", "INTEGER"), ("b", "INTEGER"), ("c", "REAL")]
        );
    }

    #[test]
    fn test_const_declarations() {
        let program = parse_ok("CONST Pi = 3.14; Greeting = 'hi'; N = 4; BEGIN END.");
        let consts: Vec<&ConstDecl> = program
            .block
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Const(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(consts.len(), 3);
        assert_eq!(consts[0].value, Value::Real(3.14));
        assert_eq!(consts[1].value, Value::Str("hi".to_string()));
        assert_eq!(consts[2].value, Value::Int(4));
    }

    #[test]
    fn test_procedure_with_param_groups() {
        let program = parse_ok(
            "PROCEDURE Q(a, b: INTEGER; x: REAL); BEGIN END; BEGIN Q(1, 2, 3.0) END.",
        );
        let Decl::Proc(proc) = &program.block.decls[0] else {
            panic!("expected ProcedureDecl");
        };
        assert_eq!(proc.name.text, "Q");
        let params: Vec<(&str, &str)> = proc
            .params
            .iter()
            .map(|p| (p.name.text.as_str(), p.ty.name.as_str()))
            .collect();
        assert_eq!(
            params,
            vec![("a", "INTEGER"), ("b", "INTEGER"), ("x", "REAL")]
        );
    }

    #[test]
    fn test_precedence_mul_before_add() {
        let program = parse_ok("BEGIN WRITE(1 + 2 * 3) END.");
        let Stmt::Write { args } = &program.block.body[0] else {
            panic!("expected Write");
        };
        let Expr::Binary {
            op, left, right, ..
        } = &args[0]
        else {
            panic!("expected BinOp");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(**left, Expr::Num { .. }));
        assert!(matches!(
            **right,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_comparison_is_non_associative() {
        // A second relational operator cannot follow a comparison.
        let result = parse_source("BEGIN WRITE(1 < 2 < 3) END.");
        assert!(result.is_err());
    }

    #[test]
    fn test_logical_precedence() {
        // NOT binds tighter than AND, AND tighter than OR.
        let program = parse_ok("BEGIN WRITE(NOT a AND b OR c) END.");
        let Stmt::Write { args } = &program.block.body[0] else {
            panic!("expected Write");
        };
        let Expr::Binary { op, left, .. } = &args[0] else {
            panic!("expected BinOp");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert!(matches!(
            **left,
            Expr::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_dangling_else_binds_to_nearest_then() {
        let program = parse_ok("BEGIN IF a THEN IF b THEN x := 1 ELSE x := 2 END.");
        let Stmt::If {
            then_branch,
            else_branch,
            ..
        } = &program.block.body[0]
        else {
            panic!("expected If");
        };
        assert!(else_branch.is_none());
        let Stmt::If {
            else_branch: inner_else,
            ..
        } = &**then_branch
        else {
            panic!("expected nested If");
        };
        assert!(inner_else.is_some());
    }

    #[test]
    fn test_bare_identifier_is_a_procedure_call() {
        let program = parse_ok("BEGIN Greet; Greet() END.");
        assert!(matches!(
            &program.block.body[0],
            Stmt::Call { name, args } if name.text == "Greet" && args.is_empty()
        ));
        assert!(matches!(
            &program.block.body[1],
            Stmt::Call { name, args } if name.text == "Greet" && args.is_empty()
        ));
    }

    #[test]
    fn test_identifier_followed_by_operand_is_an_error() {
        let err = parse_source("BEGIN x 1 END.").unwrap_err();
        assert!(err.message.contains("expected ':='"));
    }

    #[test]
    fn test_read_write_statements() {
        let program = parse_ok("VAR a, b: INTEGER; BEGIN READ(a, b); WRITE(a, ' ', b) END.");
        assert!(matches!(
            &program.block.body[0],
            Stmt::Read { targets } if targets.len() == 2
        ));
        assert!(matches!(
            &program.block.body[1],
            Stmt::Write { args } if args.len() == 3
        ));
    }

    #[test]
    fn test_trailing_semicolon_before_end() {
        let program = parse_ok("BEGIN x := 1; END.");
        assert_eq!(program.block.body.len(), 1);
    }

    #[test]
    fn test_missing_dot_is_an_error() {
        let err = parse_source("BEGIN END").unwrap_err();
        assert!(err.message.contains("Expected token DOT"));
    }

    #[test]
    fn test_trailing_tokens_after_dot_are_an_error() {
        let err = parse_source("BEGIN END. BEGIN").unwrap_err();
        assert!(err.message.contains("Expected end of input"));
    }

    #[test]
    fn test_unary_minus_in_primary() {
        let program = parse_ok("BEGIN x := -2 * 3 END.");
        let Stmt::Assign { value, .. } = &program.block.body[0] else {
            panic!("expected Assign");
        };
        // -2 * 3 parses as (-2) * 3: unary binds at primary level.
        let Expr::Binary { op, left, .. } = value else {
            panic!("expected BinOp");
        };
        assert_eq!(*op, BinaryOp::Mul);
        assert!(matches!(
            **left,
            Expr::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let program = parse_ok("BEGIN WRITE(1 + 2, 3) END.");
        let Stmt::Write { args } = &program.block.body[0] else {
            panic!("expected Write");
        };
        let mut ids = Vec::new();
        fn collect(expr: &Expr, ids: &mut Vec<NodeId>) {
            ids.push(expr.id());
            if let Expr::Binary { left, right, .. } = expr {
                collect(left, ids);
                collect(right, ids);
            }
        }
        for arg in args {
            collect(arg, &mut ids);
        }
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }
}
