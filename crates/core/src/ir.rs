//! Linear three-address intermediate representation
//!
//! The IR is a flat instruction list. Operands are names: temporaries
//! (`t0`, `t1`, ...) minted by the IR generator, source variables, or
//! labels. Procedure bodies start with `Label(name)` followed by
//! `EnterProc` and end with `ExitProc` then `Return`; the program body
//! is marked by the distinguished label `__main_start`.

use crate::value::Value;
use std::fmt;

/// Label marking the start of the program body.
pub const MAIN_LABEL: &str = "__main_start";

/// Binary operators carried by the IR.
///
/// One sum type shared by the AST, the constant evaluator and the
/// backends; token kinds are converted exactly once, at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Real division; always produces a real.
    Div,
    /// Pascal `DIV`; integer operands only.
    IntDiv,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "DIV",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Comparison operators produce a 0/1 integer regardless of operand types.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators carried by the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "NOT",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One IR instruction.
///
/// `PartialEq` is derived so the optimizer can detect its fixed point by
/// structural comparison of instruction vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Label(String),
    LoadConst {
        target: String,
        value: Value,
    },
    LoadVar {
        target: String,
        source: String,
    },
    StoreVar {
        target: String,
        source: String,
    },
    BinOp {
        target: String,
        op: BinaryOp,
        left: String,
        right: String,
    },
    UnOp {
        target: String,
        op: UnaryOp,
        operand: String,
    },
    Jump {
        label: String,
    },
    /// Branches to `false_label` when `cond` is falsey; falls through otherwise.
    CondJump {
        cond: String,
        false_label: String,
    },
    Call {
        proc: String,
        args: Vec<String>,
        /// Reserved for value-returning routines; never filled by the
        /// current IR generator.
        result: Option<String>,
    },
    Return {
        value: Option<String>,
    },
    Read {
        target: String,
    },
    Write {
        source: String,
    },
    EnterProc {
        name: String,
        params: Vec<String>,
    },
    ExitProc {
        name: String,
    },
    NoOp,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Label(name) => write!(f, "{}:", name),
            Instr::LoadConst { target, value } => write!(f, "{} = {}", target, value.repr()),
            Instr::LoadVar { target, source } => write!(f, "{} = {}", target, source),
            Instr::StoreVar { target, source } => write!(f, "{} = {}", target, source),
            Instr::BinOp {
                target,
                op,
                left,
                right,
            } => write!(f, "{} = {} {} {}", target, left, op, right),
            Instr::UnOp {
                target,
                op,
                operand,
            } => write!(f, "{} = {} {}", target, op, operand),
            Instr::Jump { label } => write!(f, "JUMP {}", label),
            Instr::CondJump { cond, false_label } => {
                write!(f, "IF_FALSE {} JUMP {}", cond, false_label)
            }
            Instr::Call { proc, args, result } => {
                let args = args.join(", ");
                match result {
                    Some(target) => write!(f, "{} = CALL {}({})", target, proc, args),
                    None => write!(f, "CALL {}({})", proc, args),
                }
            }
            Instr::Return { value } => match value {
                Some(source) => write!(f, "RETURN {}", source),
                None => write!(f, "RETURN"),
            },
            Instr::Read { target } => write!(f, "READ {}", target),
            Instr::Write { source } => write!(f, "WRITE {}", source),
            Instr::EnterProc { name, params } => {
                write!(f, "ENTER_PROC {}({})", name, params.join(", "))
            }
            Instr::ExitProc { name } => write!(f, "EXIT_PROC {}", name),
            Instr::NoOp => write!(f, "NOOP"),
        }
    }
}

/// Render an instruction list as a numbered listing, one instruction per
/// line, the format used by `pasc ir` and the debug log.
pub fn render_listing(code: &[Instr]) -> String {
    let mut out = String::new();
    for (index, instr) in code.iter().enumerate() {
        out.push_str(&format!("{:03}: {}\n", index, instr));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_symbols() {
        assert_eq!(BinaryOp::IntDiv.symbol(), "DIV");
        assert_eq!(BinaryOp::Ne.symbol(), "!=");
        assert_eq!(BinaryOp::And.to_string(), "AND");
    }

    #[test]
    fn test_instr_display() {
        let instr = Instr::BinOp {
            target: "t2".to_string(),
            op: BinaryOp::Add,
            left: "t0".to_string(),
            right: "t1".to_string(),
        };
        assert_eq!(instr.to_string(), "t2 = t0 + t1");

        let call = Instr::Call {
            proc: "Q".to_string(),
            args: vec!["t0".to_string(), "t1".to_string()],
            result: None,
        };
        assert_eq!(call.to_string(), "CALL Q(t0, t1)");

        let jump = Instr::CondJump {
            cond: "t3".to_string(),
            false_label: "WHILE_END0".to_string(),
        };
        assert_eq!(jump.to_string(), "IF_FALSE t3 JUMP WHILE_END0");
    }

    #[test]
    fn test_structural_equality() {
        let a = Instr::LoadConst {
            target: "t0".to_string(),
            value: Value::Int(42),
        };
        let b = Instr::LoadConst {
            target: "t0".to_string(),
            value: Value::Int(42),
        };
        assert_eq!(a, b);
        assert_ne!(
            a,
            Instr::LoadConst {
                target: "t0".to_string(),
                value: Value::Real(42.0),
            }
        );
    }

    #[test]
    fn test_render_listing_numbers_lines() {
        let code = vec![
            Instr::Label(MAIN_LABEL.to_string()),
            Instr::Return { value: None },
        ];
        let listing = render_listing(&code);
        assert!(listing.starts_with("000: __main_start:"));
        assert!(listing.contains("001: RETURN"));
    }
}
