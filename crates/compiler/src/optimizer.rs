//! IR optimizer: constant folding + dead-code elimination
//!
//! Runs both passes to a fixed point, detected by structural equality of
//! the instruction vectors, capped at a small pass count. Folding uses
//! the same evaluation rules as the interpreter; anything the evaluator
//! refuses (division by zero, operand type mismatch) is left in place
//! for the runtime to report.

use pas_core::{Instr, MAIN_LABEL, Value, eval_binary, eval_unary};
use std::collections::{HashMap, HashSet};

/// Upper bound on folding/DCE rounds; each round shrinks or stabilizes
/// the list, so the bound is rarely reached.
pub const DEFAULT_MAX_PASSES: usize = 10;

pub fn optimize(code: Vec<Instr>) -> Vec<Instr> {
    optimize_with_limit(code, DEFAULT_MAX_PASSES)
}

pub fn optimize_with_limit(code: Vec<Instr>, max_passes: usize) -> Vec<Instr> {
    if code.is_empty() {
        return code;
    }
    let mut current = code;
    for _ in 0..max_passes {
        let folded = fold_constants(&current);
        let cleaned = eliminate_dead_code(folded);
        if cleaned == current {
            break;
        }
        current = cleaned;
    }
    current
}

/// One folding pass. The constant map is seeded with every `LoadConst`
/// in the list (temporaries are single-assignment, so order is
/// irrelevant) and updated as folds introduce new constants, so later
/// instructions in the same pass see them.
fn fold_constants(code: &[Instr]) -> Vec<Instr> {
    let mut constants: HashMap<String, Value> = HashMap::new();
    for instr in code {
        if let Instr::LoadConst { target, value } = instr {
            constants.insert(target.clone(), value.clone());
        }
    }

    let mut result = Vec::with_capacity(code.len());
    for instr in code {
        let folded = try_fold(instr, &constants);
        if let Instr::LoadConst { target, value } = &folded
            && &folded != instr
        {
            constants.insert(target.clone(), value.clone());
        }
        result.push(folded);
    }
    result
}

fn try_fold(instr: &Instr, constants: &HashMap<String, Value>) -> Instr {
    match instr {
        Instr::BinOp {
            target,
            op,
            left,
            right,
        } => {
            let (Some(left_value), Some(right_value)) = (constants.get(left), constants.get(right))
            else {
                return instr.clone();
            };
            match eval_binary(*op, left_value, right_value) {
                Ok(value) => Instr::LoadConst {
                    target: target.clone(),
                    value,
                },
                // Division by zero, overflow, operand mismatch: let the
                // runtime report it with full context.
                Err(_) => instr.clone(),
            }
        }
        Instr::UnOp {
            target,
            op,
            operand,
        } => {
            let Some(operand_value) = constants.get(operand) else {
                return instr.clone();
            };
            match eval_unary(*op, operand_value) {
                Ok(value) => Instr::LoadConst {
                    target: target.clone(),
                    value,
                },
                Err(_) => instr.clone(),
            }
        }
        Instr::CondJump { cond, false_label } => match constants.get(cond) {
            Some(value) if value.truthy() => Instr::NoOp,
            Some(_) => Instr::Jump {
                label: false_label.clone(),
            },
            None => instr.clone(),
        },
        _ => instr.clone(),
    }
}

/// Strip `NoOp`s, then drop everything between an unconditional control
/// transfer and the next label that is still a jump or call target.
/// Labels nobody targets are removed (the program entry label stays).
fn eliminate_dead_code(code: Vec<Instr>) -> Vec<Instr> {
    let code: Vec<Instr> = code
        .into_iter()
        .filter(|instr| !matches!(instr, Instr::NoOp))
        .collect();

    let mut active_labels: HashSet<String> = HashSet::new();
    let mut has_main = false;
    for instr in &code {
        match instr {
            Instr::Jump { label } => {
                active_labels.insert(label.clone());
            }
            Instr::CondJump { false_label, .. } => {
                active_labels.insert(false_label.clone());
            }
            Instr::Call { proc, .. } => {
                active_labels.insert(proc.clone());
            }
            Instr::Label(name) if name == MAIN_LABEL => has_main = true,
            _ => {}
        }
    }
    if has_main {
        active_labels.insert(MAIN_LABEL.to_string());
    }

    let mut reachable = Vec::with_capacity(code.len());
    let mut index = 0;
    while index < code.len() {
        let instr = &code[index];
        reachable.push(instr.clone());
        if matches!(instr, Instr::Jump { .. } | Instr::Return { .. }) {
            // Fallthrough is dead until the next label somebody targets.
            index += 1;
            while index < code.len() {
                if let Instr::Label(name) = &code[index]
                    && active_labels.contains(name)
                {
                    break;
                }
                index += 1;
            }
            continue;
        }
        index += 1;
    }

    reachable
        .into_iter()
        .filter(|instr| match instr {
            Instr::Label(name) => active_labels.contains(name),
            _ => true,
        })
        .collect()
}
