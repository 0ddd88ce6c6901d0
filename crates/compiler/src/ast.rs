//! Abstract syntax tree for the Pascal front end
//!
//! Single-owner tagged sums. Expression nodes carry a parser-assigned
//! `NodeId` so the semantic phase can record inferred types in a side
//! table instead of mutating the tree. Every node keeps the position of
//! its originating token for error reporting.

use pas_core::{BinaryOp, UnaryOp, Value};
use std::fmt::Write as _;

/// Identity of an expression node, unique within one parse.
pub type NodeId = usize;

/// An identifier occurrence with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// A type annotation as written in the source (`: INTEGER`, `: REAL`).
/// Resolution against the symbol table happens in the semantic phase.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Var(VarDecl),
    Const(ConstDecl),
    Proc(ProcDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Name,
    pub ty: TypeSpec,
}

/// `CONST name = literal`. Constants get no runtime storage; the IR
/// generator substitutes the literal at every use site.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: Name,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcDecl {
    pub name: Name,
    pub params: Vec<Param>,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Compound(Vec<Stmt>),
    Assign {
        target: Name,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Call {
        name: Name,
        args: Vec<Expr>,
    },
    Read {
        targets: Vec<Name>,
    },
    Write {
        args: Vec<Expr>,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer or real literal.
    Num {
        id: NodeId,
        value: Value,
        line: usize,
        column: usize,
    },
    Str {
        id: NodeId,
        value: String,
        line: usize,
        column: usize,
    },
    Var {
        id: NodeId,
        name: Name,
    },
    Binary {
        id: NodeId,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        /// Position of the operator token.
        line: usize,
        column: usize,
    },
    Unary {
        id: NodeId,
        op: UnaryOp,
        operand: Box<Expr>,
        line: usize,
        column: usize,
    },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Num { id, .. }
            | Expr::Str { id, .. }
            | Expr::Var { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Unary { id, .. } => *id,
        }
    }

    /// Position of the originating token, for diagnostics.
    pub fn pos(&self) -> (usize, usize) {
        match self {
            Expr::Num { line, column, .. }
            | Expr::Str { line, column, .. }
            | Expr::Binary { line, column, .. }
            | Expr::Unary { line, column, .. } => (*line, *column),
            Expr::Var { name, .. } => (name.line, name.column),
        }
    }
}

/// Render the tree as an indented listing, the form shown by `pasc ast`.
pub fn render_tree(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Program '{}'", program.name);
    render_block(&program.block, 1, &mut out);
    out
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn render_block(block: &Block, depth: usize, out: &mut String) {
    indent(depth, out);
    out.push_str("Block\n");
    for decl in &block.decls {
        match decl {
            Decl::Var(v) => {
                indent(depth + 1, out);
                let _ = writeln!(out, "VarDecl {} : {}", v.name.text, v.ty.name);
            }
            Decl::Const(c) => {
                indent(depth + 1, out);
                let _ = writeln!(out, "ConstDecl {} = {}", c.name.text, c.value.repr());
            }
            Decl::Proc(p) => {
                indent(depth + 1, out);
                let params: Vec<String> = p
                    .params
                    .iter()
                    .map(|param| format!("{}: {}", param.name.text, param.ty.name))
                    .collect();
                let _ = writeln!(out, "ProcedureDecl {}({})", p.name.text, params.join(", "));
                render_block(&p.block, depth + 2, out);
            }
        }
    }
    indent(depth + 1, out);
    out.push_str("Compound\n");
    for stmt in &block.body {
        render_stmt(stmt, depth + 2, out);
    }
}

fn render_stmt(stmt: &Stmt, depth: usize, out: &mut String) {
    indent(depth, out);
    match stmt {
        Stmt::Compound(children) => {
            out.push_str("Compound\n");
            for child in children {
                render_stmt(child, depth + 1, out);
            }
        }
        Stmt::Assign { target, value } => {
            let _ = writeln!(out, "Assign {} :=", target.text);
            render_expr(value, depth + 1, out);
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push_str("If\n");
            render_expr(cond, depth + 1, out);
            indent(depth, out);
            out.push_str("Then\n");
            render_stmt(then_branch, depth + 1, out);
            if let Some(else_branch) = else_branch {
                indent(depth, out);
                out.push_str("Else\n");
                render_stmt(else_branch, depth + 1, out);
            }
        }
        Stmt::While { cond, body } => {
            out.push_str("While\n");
            render_expr(cond, depth + 1, out);
            indent(depth, out);
            out.push_str("Do\n");
            render_stmt(body, depth + 1, out);
        }
        Stmt::Call { name, args } => {
            let _ = writeln!(out, "ProcedureCall {}", name.text);
            for arg in args {
                render_expr(arg, depth + 1, out);
            }
        }
        Stmt::Read { targets } => {
            let names: Vec<&str> = targets.iter().map(|t| t.text.as_str()).collect();
            let _ = writeln!(out, "Read({})", names.join(", "));
        }
        Stmt::Write { args } => {
            out.push_str("Write\n");
            for arg in args {
                render_expr(arg, depth + 1, out);
            }
        }
        Stmt::Empty => out.push_str("NoOp\n"),
    }
}

fn render_expr(expr: &Expr, depth: usize, out: &mut String) {
    indent(depth, out);
    match expr {
        Expr::Num { value, .. } => {
            let _ = writeln!(out, "Num {}", value.repr());
        }
        Expr::Str { value, .. } => {
            let _ = writeln!(out, "StringLiteral {:?}", value);
        }
        Expr::Var { name, .. } => {
            let _ = writeln!(out, "Variable {}", name.text);
        }
        Expr::Binary {
            op, left, right, ..
        } => {
            let _ = writeln!(out, "BinOp {}", op);
            render_expr(left, depth + 1, out);
            render_expr(right, depth + 1, out);
        }
        Expr::Unary { op, operand, .. } => {
            let _ = writeln!(out, "UnaryOp {}", op);
            render_expr(operand, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_pos_and_id() {
        let expr = Expr::Binary {
            id: 2,
            op: BinaryOp::Add,
            left: Box::new(Expr::Num {
                id: 0,
                value: Value::Int(1),
                line: 1,
                column: 1,
            }),
            right: Box::new(Expr::Num {
                id: 1,
                value: Value::Int(2),
                line: 1,
                column: 5,
            }),
            line: 1,
            column: 3,
        };
        assert_eq!(expr.id(), 2);
        assert_eq!(expr.pos(), (1, 3));
    }

    #[test]
    fn test_render_tree_shape() {
        let program = Program {
            name: "P".to_string(),
            block: Block {
                decls: vec![Decl::Var(VarDecl {
                    name: Name {
                        text: "x".to_string(),
                        line: 1,
                        column: 14,
                    },
                    ty: TypeSpec {
                        name: "INTEGER".to_string(),
                        line: 1,
                        column: 16,
                    },
                })],
                body: vec![Stmt::Assign {
                    target: Name {
                        text: "x".to_string(),
                        line: 1,
                        column: 30,
                    },
                    value: Expr::Num {
                        id: 0,
                        value: Value::Int(1),
                        line: 1,
                        column: 35,
                    },
                }],
            },
        };
        let tree = render_tree(&program);
        assert!(tree.contains("Program 'P'"));
        assert!(tree.contains("VarDecl x : INTEGER"));
        assert!(tree.contains("Assign x :="));
        assert!(tree.contains("Num 1"));
    }
}
