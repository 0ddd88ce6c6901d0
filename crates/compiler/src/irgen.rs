//! IR generation
//!
//! Pre-order walk over the analyzed AST emitting the flat instruction
//! list. Expression visitors return the name of the temporary holding
//! their result. Constants have no runtime storage: uses are substituted
//! with `LoadConst` from a side map captured while visiting declarations.
//!
//! With operator tokens already converted to sum types and the tree
//! semantically checked, generation cannot fail.

use crate::ast::{Block, Decl, Expr, ProcDecl, Program, Stmt};
use pas_core::{Instr, MAIN_LABEL, Value};
use std::collections::HashMap;

pub struct IrGenerator {
    code: Vec<Instr>,
    temp_count: usize,
    label_count: usize,
    global_constants: HashMap<String, Value>,
}

/// Lower a program to IR.
pub fn generate(program: &Program) -> Vec<Instr> {
    let mut generator = IrGenerator::new();
    generator.visit_program(program);
    generator.code
}

impl IrGenerator {
    fn new() -> Self {
        IrGenerator {
            code: Vec::new(),
            temp_count: 0,
            label_count: 0,
            global_constants: HashMap::new(),
        }
    }

    fn new_temp(&mut self) -> String {
        let name = format!("t{}", self.temp_count);
        self.temp_count += 1;
        name
    }

    fn new_label(&mut self, hint: &str) -> String {
        let name = format!("{}{}", hint, self.label_count);
        self.label_count += 1;
        name
    }

    fn emit(&mut self, instr: Instr) {
        tracing::trace!(target: "pasc::irgen", "emit {}", instr);
        self.code.push(instr);
    }

    fn visit_program(&mut self, program: &Program) {
        for decl in &program.block.decls {
            self.visit_decl(decl);
        }
        self.emit(Instr::Label(MAIN_LABEL.to_string()));
        self.emit(Instr::EnterProc {
            name: program.name.clone(),
            params: vec![],
        });
        for stmt in &program.block.body {
            self.visit_stmt(stmt);
        }
        self.emit(Instr::ExitProc {
            name: program.name.clone(),
        });
        self.emit(Instr::Return { value: None });
    }

    fn visit_decl(&mut self, decl: &Decl) {
        match decl {
            // Variables get storage on first store; nothing to emit.
            Decl::Var(_) => {}
            Decl::Const(constant) => {
                self.global_constants
                    .insert(constant.name.text.clone(), constant.value.clone());
            }
            Decl::Proc(proc) => self.visit_proc(proc),
        }
    }

    fn visit_proc(&mut self, proc: &ProcDecl) {
        self.emit(Instr::Label(proc.name.text.clone()));
        let params: Vec<String> = proc.params.iter().map(|p| p.name.text.clone()).collect();
        self.emit(Instr::EnterProc {
            name: proc.name.text.clone(),
            params,
        });
        // Constants declared in this procedure substitute only within it.
        let outer_constants = self.global_constants.clone();
        self.visit_block_inner(&proc.block);
        self.global_constants = outer_constants;
        self.emit(Instr::ExitProc {
            name: proc.name.text.clone(),
        });
        self.emit(Instr::Return { value: None });
    }

    fn visit_block_inner(&mut self, block: &Block) {
        for decl in &block.decls {
            self.visit_decl(decl);
        }
        for stmt in &block.body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Compound(children) => {
                for child in children {
                    self.visit_stmt(child);
                }
            }
            Stmt::Assign { target, value } => {
                let source = self.visit_expr(value);
                self.emit(Instr::StoreVar {
                    target: target.text.clone(),
                    source,
                });
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_temp = self.visit_expr(cond);
                let else_label = self.new_label("IF_ELSE");
                let end_label = self.new_label("IF_END");
                let false_target = if else_branch.is_some() {
                    else_label.clone()
                } else {
                    end_label.clone()
                };
                self.emit(Instr::CondJump {
                    cond: cond_temp,
                    false_label: false_target,
                });
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.emit(Instr::Jump {
                        label: end_label.clone(),
                    });
                    self.emit(Instr::Label(else_label));
                    self.visit_stmt(else_branch);
                }
                self.emit(Instr::Label(end_label));
            }
            Stmt::While { cond, body } => {
                let start_label = self.new_label("WHILE_START");
                let end_label = self.new_label("WHILE_END");
                self.emit(Instr::Label(start_label.clone()));
                let cond_temp = self.visit_expr(cond);
                self.emit(Instr::CondJump {
                    cond: cond_temp,
                    false_label: end_label.clone(),
                });
                self.visit_stmt(body);
                self.emit(Instr::Jump { label: start_label });
                self.emit(Instr::Label(end_label));
            }
            Stmt::Call { name, args } => {
                let arg_temps: Vec<String> =
                    args.iter().map(|arg| self.visit_expr(arg)).collect();
                self.emit(Instr::Call {
                    proc: name.text.clone(),
                    args: arg_temps,
                    result: None,
                });
            }
            Stmt::Read { targets } => {
                for target in targets {
                    self.emit(Instr::Read {
                        target: target.text.clone(),
                    });
                }
            }
            Stmt::Write { args } => {
                for arg in args {
                    let source = self.visit_expr(arg);
                    self.emit(Instr::Write { source });
                }
            }
            Stmt::Empty => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Num { value, .. } => {
                let target = self.new_temp();
                self.emit(Instr::LoadConst {
                    target: target.clone(),
                    value: value.clone(),
                });
                target
            }
            Expr::Str { value, .. } => {
                let target = self.new_temp();
                self.emit(Instr::LoadConst {
                    target: target.clone(),
                    value: Value::Str(value.clone()),
                });
                target
            }
            Expr::Var { name, .. } => {
                let target = self.new_temp();
                match self.global_constants.get(&name.text) {
                    Some(value) => {
                        let value = value.clone();
                        self.emit(Instr::LoadConst {
                            target: target.clone(),
                            value,
                        });
                    }
                    None => {
                        self.emit(Instr::LoadVar {
                            target: target.clone(),
                            source: name.text.clone(),
                        });
                    }
                }
                target
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left_temp = self.visit_expr(left);
                let right_temp = self.visit_expr(right);
                let target = self.new_temp();
                self.emit(Instr::BinOp {
                    target: target.clone(),
                    op: *op,
                    left: left_temp,
                    right: right_temp,
                });
                target
            }
            Expr::Unary { op, operand, .. } => {
                let operand_temp = self.visit_expr(operand);
                let target = self.new_temp();
                self.emit(Instr::UnOp {
                    target: target.clone(),
                    op: *op,
                    operand: operand_temp,
                });
                target
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pas_core::BinaryOp;

    fn ir_for(source: &str) -> Vec<Instr> {
        generate(&parse_source(source).unwrap())
    }

    #[test]
    fn test_program_frame_shape() {
        let code = ir_for("PROGRAM P; BEGIN END.");
        assert_eq!(
            code,
            vec![
                Instr::Label(MAIN_LABEL.to_string()),
                Instr::EnterProc {
                    name: "P".to_string(),
                    params: vec![],
                },
                Instr::ExitProc {
                    name: "P".to_string(),
                },
                Instr::Return { value: None },
            ]
        );
    }

    #[test]
    fn test_procedures_precede_main() {
        let code = ir_for("PROGRAM P; PROCEDURE Q(n: INTEGER); BEGIN WRITE(n) END; BEGIN Q(42) END.");
        assert_eq!(code[0], Instr::Label("Q".to_string()));
        assert_eq!(
            code[1],
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec!["n".to_string()],
            }
        );
        // Main body follows the procedure's Return.
        let main_at = code
            .iter()
            .position(|i| *i == Instr::Label(MAIN_LABEL.to_string()))
            .unwrap();
        assert!(main_at > 1);
        assert!(code[main_at..].iter().any(|i| matches!(
            i,
            Instr::Call { proc, args, result: None } if proc == "Q" && args.len() == 1
        )));
    }

    #[test]
    fn test_assignment_emits_store() {
        let code = ir_for("VAR x: INTEGER; BEGIN x := 1 + 2 END.");
        assert!(code.contains(&Instr::BinOp {
            target: "t2".to_string(),
            op: BinaryOp::Add,
            left: "t0".to_string(),
            right: "t1".to_string(),
        }));
        assert!(code.contains(&Instr::StoreVar {
            target: "x".to_string(),
            source: "t2".to_string(),
        }));
    }

    #[test]
    fn test_constant_use_substitutes_load_const() {
        let code = ir_for("CONST N = 4; BEGIN WRITE(N) END.");
        assert!(code.contains(&Instr::LoadConst {
            target: "t0".to_string(),
            value: Value::Int(4),
        }));
        assert!(!code.iter().any(|i| matches!(i, Instr::LoadVar { .. })));
    }

    #[test]
    fn test_if_without_else_shape() {
        let code = ir_for("VAR x: INTEGER; BEGIN IF 1 THEN x := 2 END.");
        // CondJump goes straight to IF_END when there is no else branch.
        assert!(code.contains(&Instr::CondJump {
            cond: "t0".to_string(),
            false_label: "IF_END1".to_string(),
        }));
        assert!(code.contains(&Instr::Label("IF_END1".to_string())));
        assert!(!code.iter().any(|i| matches!(i, Instr::Jump { .. })));
    }

    #[test]
    fn test_if_with_else_shape() {
        let code = ir_for("VAR x: INTEGER; BEGIN IF 1 THEN x := 2 ELSE x := 3 END.");
        assert!(code.contains(&Instr::CondJump {
            cond: "t0".to_string(),
            false_label: "IF_ELSE0".to_string(),
        }));
        assert!(code.contains(&Instr::Jump {
            label: "IF_END1".to_string(),
        }));
        assert!(code.contains(&Instr::Label("IF_ELSE0".to_string())));
        assert!(code.contains(&Instr::Label("IF_END1".to_string())));
    }

    #[test]
    fn test_while_shape() {
        let code = ir_for(
            "VAR i: INTEGER; BEGIN i := 0; WHILE i < 3 DO i := i + 1 END.",
        );
        let start = code
            .iter()
            .position(|i| *i == Instr::Label("WHILE_START0".to_string()))
            .unwrap();
        let end = code
            .iter()
            .position(|i| *i == Instr::Label("WHILE_END1".to_string()))
            .unwrap();
        assert!(start < end);
        assert!(code.contains(&Instr::Jump {
            label: "WHILE_START0".to_string(),
        }));
        assert!(code.iter().any(|i| matches!(
            i,
            Instr::CondJump { false_label, .. } if false_label == "WHILE_END1"
        )));
    }

    #[test]
    fn test_read_targets_source_variable_names() {
        let code = ir_for("VAR a, b: INTEGER; BEGIN READ(a, b) END.");
        assert!(code.contains(&Instr::Read {
            target: "a".to_string(),
        }));
        assert!(code.contains(&Instr::Read {
            target: "b".to_string(),
        }));
    }

    #[test]
    fn test_write_emits_one_instruction_per_argument() {
        let code = ir_for("BEGIN WRITE('a', 'b') END.");
        let writes: Vec<&Instr> = code
            .iter()
            .filter(|i| matches!(i, Instr::Write { .. }))
            .collect();
        assert_eq!(writes.len(), 2);
    }

    #[test]
    fn test_temporaries_are_monotonic() {
        let code = ir_for("BEGIN WRITE(1 + 2 + 3) END.");
        let temps: Vec<String> = code
            .iter()
            .filter_map(|i| match i {
                Instr::LoadConst { target, .. } | Instr::BinOp { target, .. } => {
                    Some(target.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(temps, vec!["t0", "t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_procedure_local_constant_does_not_leak() {
        let code = ir_for(
            "PROCEDURE Q; CONST K = 9; BEGIN WRITE(K) END; \
             VAR K: INTEGER; BEGIN K := 1; WRITE(K) END.",
        );
        // Inside Q the constant substitutes; in the main body K is a
        // plain variable load again.
        assert!(code.contains(&Instr::LoadConst {
            target: "t0".to_string(),
            value: Value::Int(9),
        }));
        assert!(code.iter().any(|i| matches!(
            i,
            Instr::LoadVar { source, .. } if source == "K"
        )));
    }

    #[test]
    fn test_argument_evaluation_left_to_right() {
        let code = ir_for(
            "PROCEDURE Q(a, b: INTEGER); BEGIN END; BEGIN Q(1, 2) END.",
        );
        let call = code
            .iter()
            .find_map(|i| match i {
                Instr::Call { args, .. } => Some(args.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(call, vec!["t0", "t1"]);
    }
}
