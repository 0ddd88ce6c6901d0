//! Semantic analysis
//!
//! One walk over the AST: declarations populate the symbol table,
//! expressions are checked and their types recorded in a side table
//! keyed by node id. All-or-nothing; the first violation aborts with a
//! positioned error.

use crate::ast::{Block, ConstDecl, Decl, Expr, Name, NodeId, ProcDecl, Program, Stmt, VarDecl};
use crate::symbols::{ConstSymbol, ProcSymbol, Symbol, SymbolTable, Ty, VarSymbol};
use pas_core::{BinaryOp, UnaryOp, Value};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl SemanticError {
    fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        SemanticError {
            message: message.into(),
            line,
            column,
        }
    }

    fn at(message: impl Into<String>, name: &Name) -> Self {
        SemanticError::new(message, name.line, name.column)
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Semantic error at L{}:C{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for SemanticError {}

/// Result of a successful analysis: the inferred type of every
/// expression node.
#[derive(Debug, Default)]
pub struct Analysis {
    pub types: HashMap<NodeId, Ty>,
}

pub struct SemanticAnalyzer {
    table: SymbolTable,
    types: HashMap<NodeId, Ty>,
}

/// Analyze a program, returning the expression-type table.
pub fn analyze(program: &Program) -> Result<Analysis, SemanticError> {
    let mut analyzer = SemanticAnalyzer {
        table: SymbolTable::new(),
        types: HashMap::new(),
    };
    analyzer.visit_block(&program.block)?;
    Ok(Analysis {
        types: analyzer.types,
    })
}

impl SemanticAnalyzer {
    fn visit_block(&mut self, block: &Block) -> Result<(), SemanticError> {
        for decl in &block.decls {
            match decl {
                Decl::Var(var) => self.visit_var_decl(var)?,
                Decl::Const(constant) => self.visit_const_decl(constant)?,
                Decl::Proc(proc) => self.visit_proc_decl(proc)?,
            }
        }
        for stmt in &block.body {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_type(&self, name: &str, line: usize, column: usize) -> Result<Ty, SemanticError> {
        match self.table.lookup(name) {
            Some(Symbol::BuiltinType(ty)) => Ok(*ty),
            _ => Err(SemanticError::new(
                format!("Type '{}' not defined", name),
                line,
                column,
            )),
        }
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) -> Result<(), SemanticError> {
        let ty = self.resolve_type(&decl.ty.name, decl.ty.line, decl.ty.column)?;
        if self.table.lookup_current_scope(&decl.name.text).is_some() {
            return Err(SemanticError::at(
                format!("Duplicate identifier '{}' found", decl.name.text),
                &decl.name,
            ));
        }
        if self.table.in_procedure_scope() {
            self.check_global_shadowing(&decl.name, ty)?;
        }
        self.table.define(
            &decl.name.text,
            Symbol::Var(VarSymbol {
                name: decl.name.text.clone(),
                ty,
            }),
        );
        Ok(())
    }

    /// Variable names are flat in the IR, so a procedure-level name may
    /// shadow a global only when that cannot change meaning: never a
    /// constant (uses are substituted at IR generation), and never a
    /// variable of a different type.
    fn check_global_shadowing(&self, name: &Name, ty: Ty) -> Result<(), SemanticError> {
        match self.table.lookup_global(&name.text) {
            Some(Symbol::Const(constant)) => Err(SemanticError::at(
                format!("'{}' conflicts with constant '{}'", name.text, constant.name),
                name,
            )),
            Some(Symbol::Var(var)) if var.ty != ty => Err(SemanticError::at(
                format!(
                    "'{}' shadows global '{}' of conflicting type {}",
                    name.text,
                    name.text,
                    var.ty.name()
                ),
                name,
            )),
            _ => Ok(()),
        }
    }

    fn literal_type(&mut self, value: &Value) -> Ty {
        match value {
            Value::Int(_) => Ty::Integer,
            Value::Real(_) => Ty::Real,
            Value::Str(_) => {
                self.table.define_global("STRING", Symbol::BuiltinType(Ty::Str));
                Ty::Str
            }
        }
    }

    fn visit_const_decl(&mut self, decl: &ConstDecl) -> Result<(), SemanticError> {
        if self.table.lookup_current_scope(&decl.name.text).is_some() {
            return Err(SemanticError::at(
                format!("Duplicate identifier '{}' found", decl.name.text),
                &decl.name,
            ));
        }
        if self.table.in_procedure_scope()
            && let Some(global) = self.table.lookup_global(&decl.name.text)
            && global.value_type().is_some()
        {
            return Err(SemanticError::at(
                format!(
                    "Constant '{}' conflicts with global '{}'",
                    decl.name.text, decl.name.text
                ),
                &decl.name,
            ));
        }
        let ty = self.literal_type(&decl.value);
        self.table.define(
            &decl.name.text,
            Symbol::Const(ConstSymbol {
                name: decl.name.text.clone(),
                ty,
                value: decl.value.clone(),
            }),
        );
        Ok(())
    }

    fn visit_proc_decl(&mut self, decl: &ProcDecl) -> Result<(), SemanticError> {
        if self.table.in_procedure_scope() {
            return Err(SemanticError::at(
                format!(
                    "Nested procedure declarations are not supported ('{}')",
                    decl.name.text
                ),
                &decl.name,
            ));
        }
        if self.table.lookup_current_scope(&decl.name.text).is_some() {
            return Err(SemanticError::at(
                format!("Duplicate identifier '{}' found", decl.name.text),
                &decl.name,
            ));
        }

        // Check parameters first so the procedure symbol carries them.
        self.table.enter_procedure_scope();
        let mut params = Vec::new();
        let result = self.define_params(decl, &mut params);
        if let Err(err) = result {
            self.table.leave_procedure_scope();
            return Err(err);
        }

        // Visible to its own body; recursion is legal.
        self.table.leave_procedure_scope();
        self.table.define(
            &decl.name.text,
            Symbol::Proc(ProcSymbol {
                name: decl.name.text.clone(),
                params: params.clone(),
            }),
        );

        self.table.enter_procedure_scope();
        for param in &params {
            self.table
                .define(&param.name, Symbol::Var(param.clone()));
        }
        let result = self.visit_block(&decl.block);
        self.table.leave_procedure_scope();
        result
    }

    fn define_params(
        &mut self,
        decl: &ProcDecl,
        params: &mut Vec<VarSymbol>,
    ) -> Result<(), SemanticError> {
        for param in &decl.params {
            let ty = self.resolve_type(&param.ty.name, param.ty.line, param.ty.column)?;
            if self.table.lookup_current_scope(&param.name.text).is_some() {
                return Err(SemanticError::at(
                    format!(
                        "Duplicate identifier (parameter) '{}' found",
                        param.name.text
                    ),
                    &param.name,
                ));
            }
            self.check_global_shadowing(&param.name, ty)?;
            let symbol = VarSymbol {
                name: param.name.text.clone(),
                ty,
            };
            self.table
                .define(&param.name.text, Symbol::Var(symbol.clone()));
            params.push(symbol);
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Compound(children) => {
                for child in children {
                    self.visit_stmt(child)?;
                }
                Ok(())
            }
            Stmt::Assign { target, value } => self.visit_assign(target, value),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(cond)?;
                self.visit_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { cond, body } => {
                self.visit_expr(cond)?;
                self.visit_stmt(body)
            }
            Stmt::Call { name, args } => self.visit_call(name, args),
            Stmt::Read { targets } => self.visit_read(targets),
            Stmt::Write { args } => {
                for arg in args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            Stmt::Empty => Ok(()),
        }
    }

    fn visit_assign(&mut self, target: &Name, value: &Expr) -> Result<(), SemanticError> {
        let value_ty = self.visit_expr(value)?;
        let symbol = self.table.lookup(&target.text).cloned();
        let var = match symbol {
            None => {
                return Err(SemanticError::at(
                    format!("Identifier not found: '{}'", target.text),
                    target,
                ));
            }
            Some(Symbol::Const(c)) => {
                return Err(SemanticError::at(
                    format!("Cannot assign to constant '{}'", c.name),
                    target,
                ));
            }
            Some(Symbol::Proc(p)) => {
                return Err(SemanticError::at(
                    format!("Cannot assign to procedure '{}'", p.name),
                    target,
                ));
            }
            Some(Symbol::BuiltinType(ty)) => {
                return Err(SemanticError::at(
                    format!("Cannot assign to type '{}'", ty.name()),
                    target,
                ));
            }
            Some(Symbol::Var(var)) => var,
        };
        if var.ty == value_ty || (var.ty == Ty::Real && value_ty == Ty::Integer) {
            return Ok(());
        }
        if var.ty == Ty::Integer && value_ty == Ty::Real {
            return Err(SemanticError::at(
                format!(
                    "Type mismatch: Cannot assign REAL expression to INTEGER variable '{}'",
                    var.name
                ),
                target,
            ));
        }
        Err(SemanticError::at(
            format!(
                "Type mismatch: Cannot assign type '{}' to variable '{}' of type '{}'",
                value_ty.name(),
                var.name,
                var.ty.name()
            ),
            target,
        ))
    }

    fn visit_call(&mut self, name: &Name, args: &[Expr]) -> Result<(), SemanticError> {
        let symbol = self.table.lookup(&name.text).cloned();
        let proc = match symbol {
            None => {
                return Err(SemanticError::at(
                    format!("Procedure '{}' not defined", name.text),
                    name,
                ));
            }
            Some(Symbol::Proc(proc)) => proc,
            Some(_) => {
                return Err(SemanticError::at(
                    format!("Identifier '{}' is not a procedure", name.text),
                    name,
                ));
            }
        };
        if args.len() != proc.params.len() {
            return Err(SemanticError::at(
                format!(
                    "Procedure '{}': Expected {} arguments, got {}",
                    name.text,
                    proc.params.len(),
                    args.len()
                ),
                name,
            ));
        }
        for (index, (arg, formal)) in args.iter().zip(proc.params.iter()).enumerate() {
            let actual_ty = self.visit_expr(arg)?;
            let compatible =
                formal.ty == actual_ty || (formal.ty == Ty::Real && actual_ty == Ty::Integer);
            if !compatible {
                let (line, column) = arg.pos();
                return Err(SemanticError::new(
                    format!(
                        "Procedure '{}', argument {}: Type mismatch. Expected '{}', got '{}'",
                        name.text,
                        index + 1,
                        formal.ty.name(),
                        actual_ty.name()
                    ),
                    line,
                    column,
                ));
            }
        }
        Ok(())
    }

    fn visit_read(&mut self, targets: &[Name]) -> Result<(), SemanticError> {
        for target in targets {
            match self.table.lookup(&target.text) {
                None => {
                    return Err(SemanticError::at(
                        format!("Identifier not found: '{}'", target.text),
                        target,
                    ));
                }
                Some(Symbol::Var(_)) => {}
                Some(Symbol::Const(_)) => {
                    return Err(SemanticError::at(
                        format!("Cannot READ into constant '{}'", target.text),
                        target,
                    ));
                }
                Some(_) => {
                    return Err(SemanticError::at(
                        format!("Cannot READ into '{}': not a variable", target.text),
                        target,
                    ));
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, id: NodeId, ty: Ty) -> Ty {
        self.types.insert(id, ty);
        ty
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<Ty, SemanticError> {
        match expr {
            Expr::Num { id, value, .. } => {
                let ty = match value {
                    Value::Real(_) => Ty::Real,
                    _ => Ty::Integer,
                };
                Ok(self.record(*id, ty))
            }
            Expr::Str { id, .. } => {
                self.table.define_global("STRING", Symbol::BuiltinType(Ty::Str));
                Ok(self.record(*id, Ty::Str))
            }
            Expr::Var { id, name } => {
                let ty = match self.table.lookup(&name.text) {
                    None => {
                        return Err(SemanticError::at(
                            format!("Identifier not found: '{}'", name.text),
                            name,
                        ));
                    }
                    Some(Symbol::Proc(_)) => {
                        return Err(SemanticError::at(
                            format!("Cannot use procedure '{}' as a value", name.text),
                            name,
                        ));
                    }
                    Some(Symbol::BuiltinType(_)) => {
                        return Err(SemanticError::at(
                            format!("Cannot use type '{}' as a value", name.text),
                            name,
                        ));
                    }
                    Some(Symbol::Var(var)) => var.ty,
                    Some(Symbol::Const(constant)) => constant.ty,
                };
                Ok(self.record(*id, ty))
            }
            Expr::Binary {
                id,
                op,
                left,
                right,
                line,
                column,
            } => {
                let left_ty = self.visit_expr(left)?;
                let right_ty = self.visit_expr(right)?;
                let ty = self.binary_type(*op, left_ty, right_ty, *line, *column)?;
                Ok(self.record(*id, ty))
            }
            Expr::Unary {
                id,
                op,
                operand,
                line,
                column,
            } => {
                let operand_ty = self.visit_expr(operand)?;
                let ty = self.unary_type(*op, operand_ty, *line, *column)?;
                Ok(self.record(*id, ty))
            }
        }
    }

    fn binary_type(
        &self,
        op: BinaryOp,
        left: Ty,
        right: Ty,
        line: usize,
        column: usize,
    ) -> Result<Ty, SemanticError> {
        let numeric = |ty: Ty| ty == Ty::Integer || ty == Ty::Real;
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                if numeric(left) && numeric(right) {
                    let ty = if op == BinaryOp::Div || left == Ty::Real || right == Ty::Real {
                        Ty::Real
                    } else {
                        Ty::Integer
                    };
                    Ok(ty)
                } else if op == BinaryOp::Add && left == Ty::Str && right == Ty::Str {
                    Ok(Ty::Str)
                } else {
                    Err(SemanticError::new(
                        format!(
                            "Operator '{}' requires compatible numeric (or string for +) operands, got '{}' and '{}'",
                            op.symbol(),
                            left.name(),
                            right.name()
                        ),
                        line,
                        column,
                    ))
                }
            }
            BinaryOp::IntDiv => {
                if left == Ty::Integer && right == Ty::Integer {
                    Ok(Ty::Integer)
                } else {
                    Err(SemanticError::new(
                        format!(
                            "Operator 'DIV' requires INTEGER operands, got '{}' and '{}'",
                            left.name(),
                            right.name()
                        ),
                        line,
                        column,
                    ))
                }
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt
            | BinaryOp::Ge => {
                let strings_comparable = left == Ty::Str
                    && right == Ty::Str
                    && matches!(op, BinaryOp::Eq | BinaryOp::Ne);
                if (numeric(left) && numeric(right)) || strings_comparable {
                    Ok(Ty::Integer)
                } else {
                    Err(SemanticError::new(
                        format!(
                            "Cannot compare types '{}' and '{}' with '{}'",
                            left.name(),
                            right.name(),
                            op.symbol()
                        ),
                        line,
                        column,
                    ))
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                if left == Ty::Integer && right == Ty::Integer {
                    Ok(Ty::Integer)
                } else {
                    Err(SemanticError::new(
                        format!(
                            "Logical operator '{}' requires boolean (integer) operands, got '{}' and '{}'",
                            op.symbol(),
                            left.name(),
                            right.name()
                        ),
                        line,
                        column,
                    ))
                }
            }
        }
    }

    fn unary_type(
        &self,
        op: UnaryOp,
        operand: Ty,
        line: usize,
        column: usize,
    ) -> Result<Ty, SemanticError> {
        match op {
            UnaryOp::Plus | UnaryOp::Neg => {
                if operand == Ty::Integer || operand == Ty::Real {
                    Ok(operand)
                } else {
                    Err(SemanticError::new(
                        format!(
                            "Unary '{}' requires numeric operand, got '{}'",
                            op.symbol(),
                            operand.name()
                        ),
                        line,
                        column,
                    ))
                }
            }
            UnaryOp::Not => {
                if operand == Ty::Integer {
                    Ok(Ty::Integer)
                } else {
                    Err(SemanticError::new(
                        format!(
                            "Operator 'NOT' requires boolean (integer) operand, got '{}'",
                            operand.name()
                        ),
                        line,
                        column,
                    ))
                }
            }
        }
    }
}
