//! NASM x86-32 backend
//!
//! Two passes over the IR. The pre-scan assigns stack-frame slots for
//! every destination name inside each procedure (the program body is a
//! procedure for this purpose), collects `.bss` globals, interns string
//! and float literals into `.data`, and infers INTEGER/REAL/STRING type
//! hints per name. Emission then renders the three sections: cdecl calls
//! into `_printf`/`_scanf`/`_exit`, x87 for anything real-valued.
//!
//! A label immediately followed by `EnterProc` is emitted once, by the
//! prologue; the program body's label is renamed `_main`.

use crate::symbols::Ty;
use pas_core::{BinaryOp, Instr, MAIN_LABEL, UnaryOp, Value};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// Error type for code generation operations.
///
/// This allows proper error propagation using `?` for both logical errors
/// (unresolvable operand scopes) and formatting errors (write failures).
#[derive(Debug)]
pub enum CodegenError {
    /// A logical error in code generation (e.g., no address for an operand)
    Logic(String),
    /// A formatting error when writing the listing
    Format(std::fmt::Error),
}

impl std::fmt::Display for CodegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodegenError::Logic(s) => write!(f, "{}", s),
            CodegenError::Format(e) => write!(f, "assembly generation error: {}", e),
        }
    }
}

impl std::error::Error for CodegenError {}

impl From<String> for CodegenError {
    fn from(s: String) -> Self {
        CodegenError::Logic(s)
    }
}

impl From<std::fmt::Error> for CodegenError {
    fn from(e: std::fmt::Error) -> Self {
        CodegenError::Format(e)
    }
}

/// Per-procedure frame layout gathered by the pre-scan.
#[derive(Debug, Default)]
struct FrameInfo {
    params: Vec<String>,
    /// name -> negative offset from ebp
    locals: HashMap<String, i32>,
    frame_size: u32,
    next_local_offset: i32,
}

/// Scope key for the type-hint table: a procedure name, or the shared
/// outer scope.
const GLOBAL_SCOPE: &str = "__global__";

pub struct NasmGenerator<'a> {
    code: &'a [Instr],
    data: String,
    bss: String,
    text: String,
    /// string content -> SL<n> label
    string_literals: HashMap<String, String>,
    /// f64 bits -> FL<n> label
    float_literals: HashMap<u64, String>,
    literal_labels: HashSet<String>,
    next_string_id: usize,
    next_float_id: usize,
    globals: HashSet<String>,
    frames: HashMap<String, FrameInfo>,
    /// (scope key, name) -> inferred type
    hints: HashMap<(String, String), Ty>,
    /// Procedure whose entry is `__main_start`.
    main_proc: Option<String>,
}

/// Generate a complete NASM listing for an IR program.
pub fn generate_nasm(code: &[Instr]) -> Result<String, CodegenError> {
    NasmGenerator::new(code).generate()
}

impl<'a> NasmGenerator<'a> {
    pub fn new(code: &'a [Instr]) -> Self {
        NasmGenerator {
            code,
            data: String::new(),
            bss: String::new(),
            text: String::new(),
            string_literals: HashMap::new(),
            float_literals: HashMap::new(),
            literal_labels: HashSet::new(),
            next_string_id: 0,
            next_float_id: 0,
            globals: HashSet::new(),
            frames: HashMap::new(),
            hints: HashMap::new(),
            main_proc: None,
        }
    }

    pub fn generate(&mut self) -> Result<String, CodegenError> {
        self.pre_scan()?;

        let mut data = String::new();
        writeln!(data, "SECTION .data")?;
        writeln!(data, "  fmt_int_write db \"%d\", 0")?;
        writeln!(data, "  fmt_str_write db \"%s\", 0")?;
        writeln!(data, "  fmt_newline db 10, 0")?;
        writeln!(data, "  fmt_int_read db \"%d\", 0")?;
        writeln!(data, "  fmt_float_write db \"%.6g\", 0")?;
        writeln!(data, "  fmt_float_read db \"%lf\", 0")?;
        data.push_str(&self.data);

        writeln!(self.bss, "SECTION .bss")?;
        let mut globals: Vec<&String> = self.globals.iter().collect();
        globals.sort();
        for name in globals {
            writeln!(self.bss, "  {} resd 1", name)?;
        }

        writeln!(self.text, "SECTION .text")?;
        writeln!(self.text, "  global _main")?;
        writeln!(self.text, "  extern _printf, _scanf, _exit")?;

        let mut current_proc: Option<String> = None;
        let code = self.code;
        for (index, instr) in code.iter().enumerate() {
            self.emit_instr(index, instr, &mut current_proc)?;
        }

        let mut listing = String::new();
        listing.push_str(&data);
        listing.push('\n');
        listing.push_str(&self.bss);
        listing.push('\n');
        listing.push_str(&self.text);
        Ok(listing)
    }

    // ------------------------------------------------------------------
    // Literal interning
    // ------------------------------------------------------------------

    fn intern_string(&mut self, value: &str) -> Result<String, CodegenError> {
        if let Some(label) = self.string_literals.get(value) {
            return Ok(label.clone());
        }
        let label = format!("SL{}", self.next_string_id);
        self.next_string_id += 1;
        // NUL-terminated UTF-8 bytes, emitted numerically so no quoting
        // rules apply.
        let mut bytes: Vec<String> = value.bytes().map(|b| b.to_string()).collect();
        bytes.push("0".to_string());
        writeln!(self.data, "  {} db {}", label, bytes.join(", "))?;
        self.string_literals.insert(value.to_string(), label.clone());
        self.literal_labels.insert(label.clone());
        Ok(label)
    }

    fn intern_float(&mut self, value: f64) -> Result<String, CodegenError> {
        let bits = value.to_bits();
        if let Some(label) = self.float_literals.get(&bits) {
            return Ok(label.clone());
        }
        let label = format!("FL{}", self.next_float_id);
        self.next_float_id += 1;
        // 32-bit IEEE-754, big-endian hex, the format the external
        // assembler stores verbatim.
        writeln!(self.data, "  {} dd 0x{:08x}", label, (value as f32).to_bits())?;
        self.float_literals.insert(bits, label.clone());
        self.literal_labels.insert(label.clone());
        Ok(label)
    }

    // ------------------------------------------------------------------
    // Scopes, addresses, type hints
    // ------------------------------------------------------------------

    fn scope_key(&self, name: &str, ctx: Option<&str>) -> Option<String> {
        if let Some(proc) = ctx {
            if name.starts_with('t') {
                return Some(proc.to_string());
            }
            if let Some(frame) = self.frames.get(proc)
                && (frame.params.iter().any(|p| p == name) || frame.locals.contains_key(name))
            {
                return Some(proc.to_string());
            }
        }
        if self.globals.contains(name) {
            return Some(GLOBAL_SCOPE.to_string());
        }
        if self.literal_labels.contains(name) {
            return None;
        }
        if name.starts_with('t') {
            return Some(GLOBAL_SCOPE.to_string());
        }
        None
    }

    fn set_hint(&mut self, name: &str, ty: Ty, ctx: Option<&str>) {
        if let Some(scope) = self.scope_key(name, ctx) {
            self.hints.insert((scope, name.to_string()), ty);
        }
    }

    fn hint(&self, name: &str, ctx: Option<&str>) -> Option<Ty> {
        let scope = self.scope_key(name, ctx)?;
        self.hints.get(&(scope, name.to_string())).copied()
    }

    /// Infer an operand's type: stored hint first, then a backward walk
    /// to the defining instruction for temporaries, then literal labels,
    /// defaulting to INTEGER.
    fn operand_type(&self, name: &str, ctx: Option<&str>, before: usize) -> Option<Ty> {
        if let Some(ty) = self.hint(name, ctx) {
            return Some(ty);
        }
        if name.starts_with('t') {
            for k in (0..before).rev() {
                let Some(target) = instr_target(&self.code[k]) else {
                    continue;
                };
                if target != name {
                    continue;
                }
                return match &self.code[k] {
                    Instr::LoadConst { value, .. } => Some(literal_ty(value)),
                    Instr::BinOp {
                        op, left, right, ..
                    } => {
                        let lt = self.operand_type(left, ctx, k);
                        let rt = self.operand_type(right, ctx, k);
                        if *op == BinaryOp::Div || lt == Some(Ty::Real) || rt == Some(Ty::Real) {
                            Some(Ty::Real)
                        } else {
                            Some(Ty::Integer)
                        }
                    }
                    Instr::UnOp { op, operand, .. } => {
                        let ot = self.operand_type(operand, ctx, k);
                        if ot == Some(Ty::Real)
                            && matches!(op, UnaryOp::Plus | UnaryOp::Neg)
                        {
                            Some(Ty::Real)
                        } else {
                            Some(Ty::Integer)
                        }
                    }
                    Instr::LoadVar { source, .. } => self.operand_type(source, ctx, k),
                    Instr::Call { .. } => Some(Ty::Integer),
                    _ => None,
                };
            }
            return None;
        }
        if self.float_literals.values().any(|label| label == name) {
            return Some(Ty::Real);
        }
        if self.string_literals.values().any(|label| label == name) {
            return Some(Ty::Str);
        }
        Some(Ty::Integer)
    }

    fn is_real(&self, name: &str, ctx: Option<&str>, before: usize) -> bool {
        self.operand_type(name, ctx, before) == Some(Ty::Real)
    }

    fn address_of(&self, name: &str, ctx: Option<&str>) -> Result<String, CodegenError> {
        if let Some(proc) = ctx
            && let Some(frame) = self.frames.get(proc)
        {
            if let Some(offset) = frame.locals.get(name) {
                return Ok(format!("ebp{}", offset));
            }
            if let Some(index) = frame.params.iter().position(|p| p == name) {
                return Ok(format!("ebp+{}", 8 + index * 4));
            }
        }
        if self.globals.contains(name) || self.literal_labels.contains(name) {
            return Ok(name.to_string());
        }
        Err(CodegenError::Logic(format!(
            "No address for operand '{}' in scope '{}'",
            name,
            ctx.unwrap_or("<none>")
        )))
    }

    /// Memory operand syntax: `[ebp-4]`, `[ebp+8]`, `[global]`, or a bare
    /// literal label (used as an address, not dereferenced).
    fn value_of(&self, name: &str, ctx: Option<&str>) -> Result<String, CodegenError> {
        let address = self.address_of(name, ctx)?;
        if self.literal_labels.contains(&address) {
            Ok(address)
        } else {
            Ok(format!("[{}]", address))
        }
    }

    // ------------------------------------------------------------------
    // Pass 1: pre-scan
    // ------------------------------------------------------------------

    fn pre_scan(&mut self) -> Result<(), CodegenError> {
        let code = self.code;
        let mut current_proc: Option<String> = None;
        let mut defined_in_proc_scopes: HashSet<String> = HashSet::new();
        let proc_labels: HashSet<String> = code
            .iter()
            .filter_map(|instr| match instr {
                Instr::EnterProc { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();

        for (index, instr) in code.iter().enumerate() {
            if let Instr::EnterProc { name, params } = instr {
                if index > 0 && matches!(&code[index - 1], Instr::Label(l) if l == MAIN_LABEL) {
                    self.main_proc = Some(name.clone());
                }
                self.frames.insert(
                    name.clone(),
                    FrameInfo {
                        params: params.clone(),
                        locals: HashMap::new(),
                        frame_size: 0,
                        next_local_offset: -4,
                    },
                );
                defined_in_proc_scopes.extend(params.iter().cloned());
                current_proc = Some(name.clone());
            }

            // Frame slot before hint inference, so the first store to a
            // fresh local already records its type.
            if let Some(proc) = &current_proc
                && let Some(target) = instr_target(instr)
                && let Some(frame) = self.frames.get_mut(proc)
                && !frame.params.iter().any(|p| p == target)
                && !frame.locals.contains_key(target)
            {
                frame.locals.insert(target.to_string(), frame.next_local_offset);
                frame.next_local_offset -= 4;
                frame.frame_size += 4;
                if !target.starts_with('t') {
                    defined_in_proc_scopes.insert(target.to_string());
                }
            }

            let scope_name = current_proc.clone().unwrap_or_else(|| GLOBAL_SCOPE.to_string());
            let ctx = Some(scope_name.as_str());
            match instr {
                Instr::LoadConst { target, value } => {
                    match value {
                        Value::Str(s) => {
                            self.intern_string(s)?;
                        }
                        Value::Real(x) => {
                            self.intern_float(*x)?;
                        }
                        Value::Int(_) => {}
                    }
                    self.set_hint(target, literal_ty(value), ctx);
                }
                Instr::BinOp {
                    target,
                    op,
                    left,
                    right,
                } => {
                    let lt = self.operand_type(left, ctx, index);
                    let rt = self.operand_type(right, ctx, index);
                    let ty = if *op == BinaryOp::Div
                        || lt == Some(Ty::Real)
                        || rt == Some(Ty::Real)
                    {
                        Ty::Real
                    } else {
                        Ty::Integer
                    };
                    self.set_hint(target, ty, ctx);
                }
                Instr::UnOp { target, operand, op } => {
                    let ot = self.operand_type(operand, ctx, index);
                    let ty = if ot == Some(Ty::Real) && matches!(op, UnaryOp::Plus | UnaryOp::Neg)
                    {
                        Ty::Real
                    } else {
                        Ty::Integer
                    };
                    self.set_hint(target, ty, ctx);
                }
                Instr::LoadVar { target, source } | Instr::StoreVar { target, source } => {
                    if let Some(ty) = self.operand_type(source, ctx, index) {
                        self.set_hint(target, ty, ctx);
                    }
                }
                Instr::Read { target } => {
                    if self.hint(target, ctx).is_none() {
                        self.set_hint(target, Ty::Integer, ctx);
                    }
                }
                Instr::ExitProc { .. } => {
                    current_proc = None;
                }
                _ => {}
            }
        }

        // Anything referenced by name that no procedure scope owns and
        // that is not a temp, a procedure, or an interned literal gets a
        // dword in .bss.
        let mut potential_globals: HashSet<String> = HashSet::new();
        for instr in self.code {
            let mut operands: Vec<&String> = Vec::new();
            match instr {
                Instr::LoadVar { source, .. } => operands.push(source),
                Instr::StoreVar { target, source } => {
                    operands.push(source);
                    operands.push(target);
                }
                Instr::Read { target } => operands.push(target),
                Instr::BinOp { left, right, .. } => {
                    operands.push(left);
                    operands.push(right);
                }
                Instr::UnOp { operand, .. } => operands.push(operand),
                Instr::CondJump { cond, .. } => operands.push(cond),
                Instr::Write { source } => operands.push(source),
                Instr::Call { args, result, .. } => {
                    operands.extend(args.iter());
                    if let Some(result) = result {
                        operands.push(result);
                    }
                }
                _ => {}
            }
            for name in operands {
                if !name.starts_with('t')
                    && !defined_in_proc_scopes.contains(name.as_str())
                    && !proc_labels.contains(name.as_str())
                    && !self.literal_labels.contains(name.as_str())
                {
                    potential_globals.insert(name.clone());
                }
            }
        }
        self.globals = potential_globals;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pass 2: emission
    // ------------------------------------------------------------------

    fn is_main(&self, proc: &str) -> bool {
        self.main_proc.as_deref() == Some(proc)
    }

    fn prologue_label<'b>(&self, proc: &'b str) -> &'b str {
        if self.is_main(proc) { "_main" } else { proc }
    }

    fn emit_instr(
        &mut self,
        index: usize,
        instr: &Instr,
        current_proc: &mut Option<String>,
    ) -> Result<(), CodegenError> {
        match instr {
            Instr::Label(name) => {
                // The prologue prints the label for procedure entries.
                let followed_by_enter =
                    matches!(self.code.get(index + 1), Some(Instr::EnterProc { .. }));
                if !followed_by_enter {
                    writeln!(self.text, "{}:", name)?;
                }
            }
            Instr::EnterProc { name, .. } => {
                *current_proc = Some(name.clone());
                let label = self.prologue_label(name).to_string();
                writeln!(self.text, "{}:", label)?;
                writeln!(self.text, "    push ebp")?;
                writeln!(self.text, "    mov ebp, esp")?;
                let frame_size = self.frames.get(name).map(|f| f.frame_size).unwrap_or(0);
                if frame_size > 0 {
                    writeln!(self.text, "    sub esp, {}", frame_size)?;
                }
            }
            Instr::ExitProc { name } => {
                writeln!(self.text, "  _{}_epilogue:", name)?;
                writeln!(self.text, "    mov esp, ebp")?;
                writeln!(self.text, "    pop ebp")?;
                if !self.is_main(name) {
                    writeln!(self.text, "    ret")?;
                }
            }
            Instr::LoadConst { target, value } => {
                let ctx = current_proc.as_deref();
                let target_val = self.value_of(target, ctx)?;
                match value {
                    Value::Int(n) => {
                        writeln!(self.text, "    mov dword {}, {}", target_val, n)?;
                    }
                    Value::Str(s) => {
                        let label = self.intern_string(s)?;
                        writeln!(self.text, "    mov dword {}, {}", target_val, label)?;
                    }
                    Value::Real(x) => {
                        let label = self.intern_float(*x)?;
                        writeln!(self.text, "    fld dword [{}]", label)?;
                        writeln!(self.text, "    fstp dword {}", target_val)?;
                    }
                }
            }
            Instr::LoadVar { target, source } | Instr::StoreVar { target, source } => {
                let ctx = current_proc.as_deref();
                let source_val = self.value_of(source, ctx)?;
                let target_val = self.value_of(target, ctx)?;
                if self.is_real(source, ctx, index) {
                    writeln!(self.text, "    fld dword {}", source_val)?;
                    writeln!(self.text, "    fstp dword {}", target_val)?;
                } else {
                    writeln!(self.text, "    mov eax, {}", source_val)?;
                    writeln!(self.text, "    mov {}, eax", target_val)?;
                }
            }
            Instr::BinOp {
                target,
                op,
                left,
                right,
            } => {
                self.emit_binop(index, target, *op, left, right, current_proc.as_deref())?;
            }
            Instr::UnOp {
                target,
                op,
                operand,
            } => {
                let ctx = current_proc.as_deref();
                let operand_val = self.value_of(operand, ctx)?;
                let target_val = self.value_of(target, ctx)?;
                if *op == UnaryOp::Neg && self.is_real(operand, ctx, index) {
                    writeln!(self.text, "    fld dword {}", operand_val)?;
                    writeln!(self.text, "    fchs")?;
                    writeln!(self.text, "    fstp dword {}", target_val)?;
                } else {
                    writeln!(self.text, "    mov eax, {}", operand_val)?;
                    match op {
                        UnaryOp::Neg => writeln!(self.text, "    neg eax")?,
                        UnaryOp::Plus => {}
                        UnaryOp::Not => {
                            writeln!(self.text, "    test eax, eax")?;
                            writeln!(self.text, "    sete al")?;
                            writeln!(self.text, "    movzx eax, al")?;
                        }
                    }
                    writeln!(self.text, "    mov {}, eax", target_val)?;
                }
            }
            Instr::Jump { label } => {
                writeln!(self.text, "    jmp {}", label)?;
            }
            Instr::CondJump { cond, false_label } => {
                let cond_val = self.value_of(cond, current_proc.as_deref())?;
                writeln!(self.text, "    mov eax, {}", cond_val)?;
                writeln!(self.text, "    test eax, eax")?;
                writeln!(self.text, "    jz {}", false_label)?;
            }
            Instr::Call { proc, args, result } => {
                let ctx = current_proc.as_deref();
                let mut pushed_bytes = 0;
                for arg in args.iter().rev() {
                    let arg_val = self.value_of(arg, ctx)?;
                    if self.is_real(arg, ctx, index) {
                        // cdecl widens float args to 64 bits.
                        writeln!(self.text, "    fld dword {}", arg_val)?;
                        writeln!(self.text, "    sub esp, 8")?;
                        writeln!(self.text, "    fstp qword [esp]")?;
                        pushed_bytes += 8;
                    } else {
                        writeln!(self.text, "    push dword {}", arg_val)?;
                        pushed_bytes += 4;
                    }
                }
                let call_label = self.prologue_label(proc).to_string();
                writeln!(self.text, "    call {}", call_label)?;
                if pushed_bytes > 0 {
                    writeln!(self.text, "    add esp, {}", pushed_bytes)?;
                }
                if let Some(result) = result {
                    // Never produced by the current front end; kept for a
                    // value-returning extension.
                    let result_val = self.value_of(result, ctx)?;
                    let is_real_return = self.hint(result, ctx) == Some(Ty::Real);
                    if is_real_return {
                        writeln!(self.text, "    fstp dword {}", result_val)?;
                    } else {
                        writeln!(self.text, "    mov {}, eax", result_val)?;
                    }
                    let ty = if is_real_return { Ty::Real } else { Ty::Integer };
                    self.set_hint(result, ty, ctx);
                }
            }
            Instr::Return { value } => {
                let Some(proc) = current_proc.clone() else {
                    return Err(CodegenError::Logic(
                        "RETURN outside any procedure context".to_string(),
                    ));
                };
                if self.is_main(&proc) {
                    writeln!(self.text, "    push 0")?;
                    writeln!(self.text, "    call _exit")?;
                } else {
                    if let Some(source) = value {
                        let ctx = Some(proc.as_str());
                        let source_val = self.value_of(source, ctx)?;
                        if self.is_real(source, ctx, index) {
                            writeln!(self.text, "    fld dword {}", source_val)?;
                        } else {
                            writeln!(self.text, "    mov eax, {}", source_val)?;
                        }
                    }
                    writeln!(self.text, "    jmp _{}_epilogue", proc)?;
                }
            }
            Instr::Read { target } => {
                let ctx = current_proc.as_deref();
                let address = self.address_of(target, ctx)?;
                let reading_real = self.hint(target, ctx) == Some(Ty::Real);
                writeln!(self.text, "    lea eax, [{}]", address)?;
                writeln!(self.text, "    push eax")?;
                let fmt = if reading_real {
                    "fmt_float_read"
                } else {
                    "fmt_int_read"
                };
                writeln!(self.text, "    push {}", fmt)?;
                writeln!(self.text, "    call _scanf")?;
                writeln!(self.text, "    add esp, 8")?;
                let ty = if reading_real { Ty::Real } else { Ty::Integer };
                self.set_hint(target, ty, ctx);
            }
            Instr::Write { source } => {
                let ctx = current_proc.as_deref();
                let source_val = self.value_of(source, ctx)?;
                let is_real_val = self.is_real(source, ctx, index);
                let is_string_val = !is_real_val
                    && (self.string_literals.values().any(|label| label == source)
                        || self.hint(source, ctx) == Some(Ty::Str));
                if is_string_val {
                    writeln!(self.text, "    push dword {}", source_val)?;
                    writeln!(self.text, "    push fmt_str_write")?;
                    writeln!(self.text, "    call _printf")?;
                    writeln!(self.text, "    add esp, 8")?;
                } else if is_real_val {
                    writeln!(self.text, "    fld dword {}", source_val)?;
                    writeln!(self.text, "    sub esp, 8")?;
                    writeln!(self.text, "    fstp qword [esp]")?;
                    writeln!(self.text, "    push fmt_float_write")?;
                    writeln!(self.text, "    call _printf")?;
                    writeln!(self.text, "    add esp, 12")?;
                } else {
                    writeln!(self.text, "    push dword {}", source_val)?;
                    writeln!(self.text, "    push fmt_int_write")?;
                    writeln!(self.text, "    call _printf")?;
                    writeln!(self.text, "    add esp, 8")?;
                }
            }
            Instr::NoOp => {
                writeln!(self.text, "    nop")?;
            }
        }
        Ok(())
    }

    fn emit_binop(
        &mut self,
        index: usize,
        target: &str,
        op: BinaryOp,
        left: &str,
        right: &str,
        ctx: Option<&str>,
    ) -> Result<(), CodegenError> {
        let target_val = self.value_of(target, ctx)?;
        let left_val = self.value_of(left, ctx)?;
        let right_val = self.value_of(right, ctx)?;
        let left_ty = self.operand_type(left, ctx, index);
        let right_ty = self.operand_type(right, ctx, index);
        let produces_real =
            op == BinaryOp::Div || left_ty == Some(Ty::Real) || right_ty == Some(Ty::Real);

        let is_arith = matches!(
            op,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        );
        if is_arith && produces_real {
            self.emit_x87_load(left_ty, &left_val)?;
            self.emit_x87_load(right_ty, &right_val)?;
            match op {
                BinaryOp::Add => writeln!(self.text, "    faddp st1, st0")?,
                BinaryOp::Sub => writeln!(self.text, "    fsubp st1, st0")?,
                BinaryOp::Mul => writeln!(self.text, "    fmulp st1, st0")?,
                BinaryOp::Div => {
                    // On a zero divisor, pop both operands and produce
                    // 0.0 instead of trapping.
                    let zero_label = format!("DIV_BY_ZERO_ERR_{}", index);
                    let ok_label = format!("DIV_OK_{}", index);
                    writeln!(self.text, "    ftst")?;
                    writeln!(self.text, "    fstsw ax")?;
                    writeln!(self.text, "    sahf")?;
                    writeln!(self.text, "    jz {}", zero_label)?;
                    writeln!(self.text, "    fdivp st1, st0")?;
                    writeln!(self.text, "    jmp {}", ok_label)?;
                    writeln!(self.text, "{}:", zero_label)?;
                    writeln!(self.text, "    fstp st0")?;
                    writeln!(self.text, "    fstp st0")?;
                    writeln!(self.text, "    fldz")?;
                    writeln!(self.text, "{}:", ok_label)?;
                }
                _ => unreachable!("is_arith covers only +,-,*,/"),
            }
            writeln!(self.text, "    fstp dword {}", target_val)?;
            return Ok(());
        }

        if left_ty == Some(Ty::Real) || right_ty == Some(Ty::Real) {
            // No x87 comparison path; real-valued comparisons and
            // logical ops degrade to a zero result.
            writeln!(self.text, "    mov dword {}, 0", target_val)?;
            return Ok(());
        }

        writeln!(self.text, "    mov eax, {}", left_val)?;
        writeln!(self.text, "    mov ebx, {}", right_val)?;
        match op {
            BinaryOp::Add => writeln!(self.text, "    add eax, ebx")?,
            BinaryOp::Sub => writeln!(self.text, "    sub eax, ebx")?,
            BinaryOp::Mul => writeln!(self.text, "    imul eax, ebx")?,
            BinaryOp::IntDiv => {
                writeln!(self.text, "    cdq")?;
                writeln!(self.text, "    idiv ebx")?;
            }
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let set = match op {
                    BinaryOp::Eq => "sete",
                    BinaryOp::Ne => "setne",
                    BinaryOp::Lt => "setl",
                    BinaryOp::Le => "setle",
                    BinaryOp::Gt => "setg",
                    BinaryOp::Ge => "setge",
                    _ => unreachable!(),
                };
                writeln!(self.text, "    cmp eax, ebx")?;
                writeln!(self.text, "    {} al", set)?;
                writeln!(self.text, "    movzx eax, al")?;
            }
            BinaryOp::And | BinaryOp::Or => {
                let combine = if op == BinaryOp::And { "and" } else { "or" };
                writeln!(self.text, "    {} eax, ebx", combine)?;
                // Normalize to 0/1.
                writeln!(self.text, "    test eax, eax")?;
                writeln!(self.text, "    setne al")?;
                writeln!(self.text, "    movzx eax, al")?;
            }
            BinaryOp::Div => unreachable!("real division always takes the x87 path"),
        }
        writeln!(self.text, "    mov {}, eax", target_val)?;
        Ok(())
    }

    fn emit_x87_load(&mut self, ty: Option<Ty>, value_syntax: &str) -> Result<(), CodegenError> {
        match ty {
            Some(Ty::Real) => writeln!(self.text, "    fld dword {}", value_syntax)?,
            Some(Ty::Integer) => writeln!(self.text, "    fild dword {}", value_syntax)?,
            _ => writeln!(self.text, "    fldz")?,
        }
        Ok(())
    }
}

fn literal_ty(value: &Value) -> Ty {
    match value {
        Value::Int(_) => Ty::Integer,
        Value::Real(_) => Ty::Real,
        Value::Str(_) => Ty::Str,
    }
}

/// The destination name an instruction writes, if any.
fn instr_target(instr: &Instr) -> Option<&str> {
    match instr {
        Instr::LoadConst { target, .. }
        | Instr::LoadVar { target, .. }
        | Instr::StoreVar { target, .. }
        | Instr::BinOp { target, .. }
        | Instr::UnOp { target, .. }
        | Instr::Read { target } => Some(target),
        Instr::Call {
            result: Some(result),
            ..
        } => Some(result),
        _ => None,
    }
}
