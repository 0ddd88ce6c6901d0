//! Register-free IR interpreter
//!
//! Executes a finalized instruction list with an instruction pointer, a
//! global memory map and a stack of call frames. Operand lookup checks
//! the active frame first, then global memory. Stores inside a frame go
//! to the frame unless the name is already a known global, in which case
//! the global is mutated; parameters and existing frame locals always
//! stay frame-local.

use crate::error::RuntimeError;
use crate::io::{InputProvider, OutputSink};
use pas_core::{Instr, MAIN_LABEL, Value, eval_binary, eval_unary};
use std::collections::HashMap;
use std::fmt::Write as _;

/// One call record: parameters and locals of an active procedure call.
#[derive(Debug)]
struct Frame {
    name: String,
    return_ip: usize,
    entry_ip: usize,
    locals: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct Interpreter<'a> {
    code: &'a [Instr],
    labels: HashMap<String, usize>,
    memory: HashMap<String, Value>,
    call_stack: Vec<Frame>,
    ip: usize,
}

impl<'a> Interpreter<'a> {
    /// Build the label index and position the instruction pointer just
    /// past `__main_start` (or at 0 when the program has no body label).
    pub fn new(code: &'a [Instr]) -> Result<Self, RuntimeError> {
        let mut labels = HashMap::new();
        for (index, instr) in code.iter().enumerate() {
            if let Instr::Label(name) = instr {
                if labels.insert(name.clone(), index).is_some() {
                    return Err(RuntimeError::new(
                        format!("Duplicate label found: {}", name),
                        index,
                    ));
                }
            }
        }
        let ip = match labels.get(MAIN_LABEL) {
            Some(&index) => index + 1,
            None => 0,
        };
        Ok(Interpreter {
            code,
            labels,
            memory: HashMap::new(),
            call_stack: Vec::new(),
            ip,
        })
    }

    /// Global memory after (or during) a run; used by tests and dumps.
    pub fn memory(&self) -> &HashMap<String, Value> {
        &self.memory
    }

    fn is_procedure_label(&self, name: &str) -> bool {
        self.labels
            .get(name)
            .is_some_and(|&index| matches!(self.code.get(index + 1), Some(Instr::EnterProc { .. })))
    }

    fn get_value(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(frame) = self.call_stack.last()
            && let Some(value) = frame.locals.get(name)
        {
            return Ok(value.clone());
        }
        if let Some(value) = self.memory.get(name) {
            return Ok(value.clone());
        }
        if self.is_procedure_label(name) {
            return Err(RuntimeError::new(
                format!("Attempting to use procedure '{}' as a variable", name),
                self.ip,
            ));
        }
        Err(RuntimeError::new(
            format!("Variable or temporary '{}' not found in current scope or global memory", name),
            self.ip,
        ))
    }

    fn is_param_of_current_frame(&self, name: &str) -> bool {
        let Some(frame) = self.call_stack.last() else {
            return false;
        };
        match self.code.get(frame.entry_ip) {
            Some(Instr::EnterProc { params, .. }) => params.iter().any(|p| p == name),
            _ => false,
        }
    }

    fn set_value(&mut self, name: &str, value: Value) {
        if self.call_stack.is_empty() {
            self.memory.insert(name.to_string(), value);
            return;
        }
        let stays_in_frame = self.is_param_of_current_frame(name)
            || self
                .call_stack
                .last()
                .is_some_and(|frame| frame.locals.contains_key(name));
        if !stays_in_frame && self.memory.contains_key(name) {
            self.memory.insert(name.to_string(), value);
            return;
        }
        self.call_stack
            .last_mut()
            .expect("frame checked above")
            .locals
            .insert(name.to_string(), value);
    }

    fn label_index(&self, label: &str, what: &str) -> Result<usize, RuntimeError> {
        self.labels.get(label).copied().ok_or_else(|| {
            RuntimeError::new(format!("Undefined label for {}: {}", what, label), self.ip)
        })
    }

    /// Execute until the code range is left, an empty-stack `RETURN` runs,
    /// or an error aborts the run. The sink is flushed before returning on
    /// every path.
    pub fn run(
        &mut self,
        output: &mut dyn OutputSink,
        input: &mut dyn InputProvider,
    ) -> Result<(), RuntimeError> {
        let result = self.run_inner(output, input);
        let _ = output.flush();
        result
    }

    fn run_inner(
        &mut self,
        output: &mut dyn OutputSink,
        input: &mut dyn InputProvider,
    ) -> Result<(), RuntimeError> {
        // The slice outlives &mut self, so instruction fields can be
        // borrowed across the state mutations below.
        let code = self.code;
        while self.ip < code.len() {
            let mut jumped = false;
            match &code[self.ip] {
                Instr::Label(_) | Instr::EnterProc { .. } | Instr::ExitProc { .. } | Instr::NoOp => {}
                Instr::LoadConst { target, value } => {
                    self.set_value(target, value.clone());
                }
                Instr::LoadVar { target, source } | Instr::StoreVar { target, source } => {
                    let value = self.get_value(source)?;
                    self.set_value(target, value);
                }
                Instr::BinOp {
                    target,
                    op,
                    left,
                    right,
                } => {
                    let left_value = self.get_value(left)?;
                    let right_value = self.get_value(right)?;
                    let result = eval_binary(*op, &left_value, &right_value)
                        .map_err(|e| RuntimeError::from_eval(e, self.ip))?;
                    self.set_value(target, result);
                }
                Instr::UnOp {
                    target,
                    op,
                    operand,
                } => {
                    let operand_value = self.get_value(operand)?;
                    let result = eval_unary(*op, &operand_value)
                        .map_err(|e| RuntimeError::from_eval(e, self.ip))?;
                    self.set_value(target, result);
                }
                Instr::Jump { label } => {
                    self.ip = self.label_index(label, "JUMP")?;
                    jumped = true;
                }
                Instr::CondJump { cond, false_label } => {
                    let condition = self.get_value(cond)?;
                    if !condition.truthy() {
                        self.ip = self.label_index(false_label, "IF_FALSE")?;
                        jumped = true;
                    }
                }
                Instr::Call { proc, args, .. } => {
                    // Note: the result slot is never filled by the IR
                    // generator (procedures only); a hypothetical value
                    // return would land here.
                    let target_ip = self.labels.get(proc).copied().ok_or_else(|| {
                        RuntimeError::new(format!("Undefined procedure called: {}", proc), self.ip)
                    })?;
                    let entry_ip = target_ip + 1;
                    let Some(Instr::EnterProc { params, .. }) = code.get(entry_ip) else {
                        return Err(RuntimeError::new(
                            format!("Label '{}' does not point to a procedure entry", proc),
                            self.ip,
                        ));
                    };
                    if args.len() != params.len() {
                        return Err(RuntimeError::new(
                            format!(
                                "Procedure '{}': expected {} arguments, got {}",
                                proc,
                                params.len(),
                                args.len()
                            ),
                            self.ip,
                        ));
                    }
                    let mut locals = HashMap::new();
                    for (param, arg) in params.iter().zip(args.iter()) {
                        locals.insert(param.clone(), self.get_value(arg)?);
                    }
                    self.call_stack.push(Frame {
                        name: proc.clone(),
                        return_ip: self.ip + 1,
                        entry_ip,
                        locals,
                    });
                    self.ip = entry_ip;
                    jumped = true;
                }
                Instr::Return { .. } => {
                    match self.call_stack.pop() {
                        Some(frame) => self.ip = frame.return_ip,
                        None => self.ip = self.code.len(),
                    }
                    jumped = true;
                }
                Instr::Read { target } => {
                    let prompt = format!("Enter value for {}: ", target);
                    let line = input.read_line(&prompt).ok_or_else(|| {
                        RuntimeError::new("Input stream closed or cancelled", self.ip)
                    })?;
                    let text = line.trim();
                    let value = if let Ok(n) = text.parse::<i64>() {
                        Value::Int(n)
                    } else if let Ok(x) = text.parse::<f64>() {
                        Value::Real(x)
                    } else {
                        return Err(RuntimeError::new(
                            "Invalid input: expected integer or real",
                            self.ip,
                        ));
                    };
                    self.set_value(target, value);
                }
                Instr::Write { source } => {
                    let value = self.get_value(source)?;
                    output.write_text(&value.to_string()).map_err(|e| {
                        RuntimeError::new(format!("Output sink failed: {}", e), self.ip)
                    })?;
                }
            }
            if !jumped {
                self.ip += 1;
            }
        }
        Ok(())
    }

    /// Render the machine state for the diagnostic log: the stopping
    /// point, global memory and every frame's locals, keys sorted.
    pub fn dump_state(&self) -> String {
        let mut out = String::new();
        let instr = self
            .code
            .get(self.ip)
            .map(|i| i.to_string())
            .unwrap_or_else(|| "<end of code>".to_string());
        let _ = writeln!(out, "IP={} instruction: {}", self.ip, instr);
        let _ = writeln!(out, "Memory:");
        let mut names: Vec<_> = self.memory.keys().collect();
        names.sort();
        for name in names {
            let _ = writeln!(out, "  {} = {}", name, self.memory[name].repr());
        }
        if self.call_stack.is_empty() {
            let _ = writeln!(out, "Call stack: <empty>");
        } else {
            let _ = writeln!(out, "Call stack frames:");
            for (depth, frame) in self.call_stack.iter().enumerate() {
                let mut locals: Vec<_> = frame.locals.keys().collect();
                locals.sort();
                let rendered: Vec<String> = locals
                    .iter()
                    .map(|k| format!("{}={}", k, frame.locals[*k].repr()))
                    .collect();
                let _ = writeln!(
                    out,
                    "  frame {} ({}): {}",
                    depth,
                    frame.name,
                    rendered.join(", ")
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemorySink, QueuedInput};
    use pas_core::{BinaryOp, UnaryOp};

    fn label(name: &str) -> Instr {
        Instr::Label(name.to_string())
    }

    fn load_const(target: &str, value: Value) -> Instr {
        Instr::LoadConst {
            target: target.to_string(),
            value,
        }
    }

    fn write(source: &str) -> Instr {
        Instr::Write {
            source: source.to_string(),
        }
    }

    fn main_wrapped(body: Vec<Instr>) -> Vec<Instr> {
        let mut code = vec![
            label(MAIN_LABEL),
            Instr::EnterProc {
                name: "P".to_string(),
                params: vec![],
            },
        ];
        code.extend(body);
        code.push(Instr::ExitProc {
            name: "P".to_string(),
        });
        code.push(Instr::Return { value: None });
        code
    }

    fn run_collecting(code: &[Instr], input_lines: &[&str]) -> Result<String, RuntimeError> {
        let mut interp = Interpreter::new(code)?;
        let mut sink = MemorySink::new();
        let mut input = QueuedInput::new(input_lines.iter().copied());
        interp.run(&mut sink, &mut input)?;
        Ok(sink.contents().to_string())
    }

    #[test]
    fn test_write_string_constant() {
        let code = main_wrapped(vec![
            load_const("t0", Value::Str("Hello".to_string())),
            write("t0"),
        ]);
        assert_eq!(run_collecting(&code, &[]).unwrap(), "Hello");
    }

    #[test]
    fn test_binary_op_and_store() {
        let code = main_wrapped(vec![
            load_const("t0", Value::Int(1)),
            load_const("t1", Value::Int(2)),
            Instr::BinOp {
                target: "t2".to_string(),
                op: BinaryOp::Add,
                left: "t0".to_string(),
                right: "t1".to_string(),
            },
            Instr::StoreVar {
                target: "x".to_string(),
                source: "t2".to_string(),
            },
            write("x"),
        ]);
        assert_eq!(run_collecting(&code, &[]).unwrap(), "3");
    }

    #[test]
    fn test_while_loop_counts() {
        // i := 0; WHILE i < 3 DO BEGIN WRITE(i); i := i + 1 END
        let code = main_wrapped(vec![
            load_const("t0", Value::Int(0)),
            Instr::StoreVar {
                target: "i".to_string(),
                source: "t0".to_string(),
            },
            label("WHILE_START0"),
            Instr::LoadVar {
                target: "t1".to_string(),
                source: "i".to_string(),
            },
            load_const("t2", Value::Int(3)),
            Instr::BinOp {
                target: "t3".to_string(),
                op: BinaryOp::Lt,
                left: "t1".to_string(),
                right: "t2".to_string(),
            },
            Instr::CondJump {
                cond: "t3".to_string(),
                false_label: "WHILE_END1".to_string(),
            },
            Instr::LoadVar {
                target: "t4".to_string(),
                source: "i".to_string(),
            },
            write("t4"),
            Instr::LoadVar {
                target: "t5".to_string(),
                source: "i".to_string(),
            },
            load_const("t6", Value::Int(1)),
            Instr::BinOp {
                target: "t7".to_string(),
                op: BinaryOp::Add,
                left: "t5".to_string(),
                right: "t6".to_string(),
            },
            Instr::StoreVar {
                target: "i".to_string(),
                source: "t7".to_string(),
            },
            Instr::Jump {
                label: "WHILE_START0".to_string(),
            },
            label("WHILE_END1"),
        ]);
        assert_eq!(run_collecting(&code, &[]).unwrap(), "012");
    }

    #[test]
    fn test_procedure_call_binds_parameters() {
        let mut code = vec![
            label("Q"),
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec!["n".to_string()],
            },
            write("n"),
            Instr::ExitProc {
                name: "Q".to_string(),
            },
            Instr::Return { value: None },
        ];
        code.extend(main_wrapped(vec![
            load_const("t0", Value::Int(42)),
            Instr::Call {
                proc: "Q".to_string(),
                args: vec!["t0".to_string()],
                result: None,
            },
        ]));
        assert_eq!(run_collecting(&code, &[]).unwrap(), "42");
    }

    #[test]
    fn test_call_arity_mismatch_is_runtime_error() {
        let mut code = vec![
            label("Q"),
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec!["n".to_string()],
            },
            Instr::ExitProc {
                name: "Q".to_string(),
            },
            Instr::Return { value: None },
        ];
        code.extend(main_wrapped(vec![Instr::Call {
            proc: "Q".to_string(),
            args: vec![],
            result: None,
        }]));
        let err = run_collecting(&code, &[]).unwrap_err();
        assert!(err.message.contains("expected 1 arguments, got 0"));
    }

    #[test]
    fn test_division_by_zero_writes_nothing() {
        let code = main_wrapped(vec![
            load_const("t0", Value::Int(5)),
            load_const("t1", Value::Int(0)),
            Instr::BinOp {
                target: "t2".to_string(),
                op: BinaryOp::IntDiv,
                left: "t0".to_string(),
                right: "t1".to_string(),
            },
            write("t2"),
        ]);
        let mut interp = Interpreter::new(&code).unwrap();
        let mut sink = MemorySink::new();
        let mut input = QueuedInput::new(Vec::<String>::new());
        let err = interp.run(&mut sink, &mut input).unwrap_err();
        assert!(err.message.contains("Division by zero"));
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_read_parses_int_then_real() {
        let code = main_wrapped(vec![
            Instr::Read {
                target: "a".to_string(),
            },
            Instr::Read {
                target: "b".to_string(),
            },
            write("a"),
            write("b"),
        ]);
        assert_eq!(run_collecting(&code, &["7", "2.5"]).unwrap(), "72.5");
    }

    #[test]
    fn test_read_cancellation_aborts() {
        let code = main_wrapped(vec![Instr::Read {
            target: "a".to_string(),
        }]);
        let err = run_collecting(&code, &[]).unwrap_err();
        assert!(err.message.contains("closed or cancelled"));
    }

    #[test]
    fn test_read_rejects_garbage() {
        let code = main_wrapped(vec![Instr::Read {
            target: "a".to_string(),
        }]);
        let err = run_collecting(&code, &["abc"]).unwrap_err();
        assert!(err.message.contains("expected integer or real"));
    }

    #[test]
    fn test_store_inside_frame_mutates_known_global() {
        // main: g := 1; Q(); WRITE(g)   where Q does g := 2
        let mut code = vec![
            label("Q"),
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec![],
            },
            load_const("t5", Value::Int(2)),
            Instr::StoreVar {
                target: "g".to_string(),
                source: "t5".to_string(),
            },
            Instr::ExitProc {
                name: "Q".to_string(),
            },
            Instr::Return { value: None },
        ];
        code.extend(main_wrapped(vec![
            load_const("t0", Value::Int(1)),
            Instr::StoreVar {
                target: "g".to_string(),
                source: "t0".to_string(),
            },
            Instr::Call {
                proc: "Q".to_string(),
                args: vec![],
                result: None,
            },
            write("g"),
        ]));
        assert_eq!(run_collecting(&code, &[]).unwrap(), "2");
    }

    #[test]
    fn test_store_of_unknown_name_stays_frame_local() {
        // Q writes a name main never defined; it must not leak into
        // global memory.
        let mut code = vec![
            label("Q"),
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec![],
            },
            load_const("t5", Value::Int(9)),
            Instr::StoreVar {
                target: "scratch".to_string(),
                source: "t5".to_string(),
            },
            Instr::ExitProc {
                name: "Q".to_string(),
            },
            Instr::Return { value: None },
        ];
        code.extend(main_wrapped(vec![Instr::Call {
            proc: "Q".to_string(),
            args: vec![],
            result: None,
        }]));
        let mut interp = Interpreter::new(&code).unwrap();
        let mut sink = MemorySink::new();
        let mut input = QueuedInput::new(Vec::<String>::new());
        interp.run(&mut sink, &mut input).unwrap();
        assert!(!interp.memory().contains_key("scratch"));
    }

    #[test]
    fn test_parameter_shadows_global_of_same_name() {
        // g is global; Q(g: ...) assigns its parameter, global unchanged.
        let mut code = vec![
            label("Q"),
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec!["g".to_string()],
            },
            load_const("t5", Value::Int(99)),
            Instr::StoreVar {
                target: "g".to_string(),
                source: "t5".to_string(),
            },
            Instr::ExitProc {
                name: "Q".to_string(),
            },
            Instr::Return { value: None },
        ];
        code.extend(main_wrapped(vec![
            load_const("t0", Value::Int(1)),
            Instr::StoreVar {
                target: "g".to_string(),
                source: "t0".to_string(),
            },
            load_const("t1", Value::Int(5)),
            Instr::Call {
                proc: "Q".to_string(),
                args: vec!["t1".to_string()],
                result: None,
            },
            write("g"),
        ]));
        assert_eq!(run_collecting(&code, &[]).unwrap(), "1");
    }

    #[test]
    fn test_using_procedure_as_variable_is_an_error() {
        let mut code = vec![
            label("Q"),
            Instr::EnterProc {
                name: "Q".to_string(),
                params: vec![],
            },
            Instr::ExitProc {
                name: "Q".to_string(),
            },
            Instr::Return { value: None },
        ];
        code.extend(main_wrapped(vec![write("Q")]));
        let err = run_collecting(&code, &[]).unwrap_err();
        assert!(err.message.contains("procedure 'Q' as a variable"));
    }

    #[test]
    fn test_undefined_name_is_an_error() {
        let code = main_wrapped(vec![write("nope")]);
        let err = run_collecting(&code, &[]).unwrap_err();
        assert!(err.message.contains("'nope' not found"));
    }

    #[test]
    fn test_duplicate_label_rejected_up_front() {
        let code = vec![label("L"), label("L")];
        let err = Interpreter::new(&code).unwrap_err();
        assert!(err.message.contains("Duplicate label"));
    }

    #[test]
    fn test_empty_stack_return_terminates() {
        let code = vec![
            label(MAIN_LABEL),
            Instr::EnterProc {
                name: "P".to_string(),
                params: vec![],
            },
            Instr::Return { value: None },
            // Unreachable: would be an undefined-name error if executed.
            write("nope"),
        ];
        assert_eq!(run_collecting(&code, &[]).unwrap(), "");
    }

    #[test]
    fn test_dump_state_lists_memory_and_frames() {
        let code = main_wrapped(vec![
            load_const("t0", Value::Int(1)),
            Instr::StoreVar {
                target: "x".to_string(),
                source: "t0".to_string(),
            },
        ]);
        let mut interp = Interpreter::new(&code).unwrap();
        let mut sink = MemorySink::new();
        let mut input = QueuedInput::new(Vec::<String>::new());
        interp.run(&mut sink, &mut input).unwrap();
        let dump = interp.dump_state();
        assert!(dump.contains("x = 1"));
        assert!(dump.contains("Call stack: <empty>"));
    }

    #[test]
    fn test_unary_not_coerces() {
        let code = main_wrapped(vec![
            load_const("t0", Value::Int(0)),
            Instr::UnOp {
                target: "t1".to_string(),
                op: UnaryOp::Not,
                operand: "t0".to_string(),
            },
            write("t1"),
        ]);
        assert_eq!(run_collecting(&code, &[]).unwrap(), "1");
    }
}
