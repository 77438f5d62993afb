use crate::error::GenError;
use bayak_par::{
    Assign, Block, CmpOp, CmpStmt, Fcall, Fdef, IfChain, Number, NumberValue, Operand, Operator,
    ReturnStmt, Script, Stmt, TopLevel, Value, ValueExpr, ValueItem, ValueStmt, Var,
};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Index of the sole recognized builtin, `print`. Mirrors `bayak::vm::BUILTIN_PRINT`;
/// kept as a local constant so this crate does not need to depend on the VM crate
/// just to name one index.
const BUILTIN_PRINT: u8 = 0;

/// Per-scope state: one top-level pass, or one function body. Each scope gets its
/// own output buffer, local symbol table, and label-depth counters, but shares the
/// generator's global symbol table and function table.
struct Scope {
    out: String,
    locals: Option<HashMap<String, u8>>,
    label_depth: Vec<u32>,
    pending_label: Option<String>,
}

impl Scope {
    fn top_level() -> Scope {
        Scope {
            out: String::new(),
            locals: None,
            label_depth: vec![0],
            pending_label: None,
        }
    }

    fn function() -> Scope {
        Scope {
            out: String::new(),
            locals: Some(HashMap::new()),
            label_depth: vec![0],
            pending_label: None,
        }
    }

    fn emit(&mut self, instr: &str) {
        if let Some(label) = self.pending_label.take() {
            write!(self.out, "{}: ", label).unwrap();
        }
        self.out.push_str(instr);
        self.out.push('\n');
    }

    fn next_label(&mut self, name: &str) -> String {
        let depth: Vec<String> = self.label_depth.iter().map(|d| d.to_string()).collect();
        format!("_{}_{}", depth.join("_"), name)
    }

    fn enter_chain(&mut self) {
        self.label_depth.push(0);
    }

    fn exit_chain(&mut self) {
        self.label_depth.pop();
        if let Some(last) = self.label_depth.last_mut() {
            *last += 1;
        }
    }
}

/// Walks a parsed [`bayak_par::Script`] and emits the corresponding textual
/// bytecode assembly, one mnemonic (and optional leading `label:`) per line.
pub struct AsmGen {
    globals: HashMap<String, u8>,
    func_names: HashMap<String, u8>,
    funcs: Vec<String>,
}

pub fn generate(script: &Script) -> Result<String, GenError> {
    let mut gen = AsmGen {
        globals: HashMap::new(),
        func_names: HashMap::new(),
        funcs: Vec::new(),
    };
    gen.run(script)
}

impl AsmGen {
    fn run(&mut self, script: &Script) -> Result<String, GenError> {
        let mut top = Scope::top_level();
        for item in &script.items {
            match item {
                TopLevel::Fdef(fdef) => self.gen_fdef(fdef)?,
                TopLevel::Stmt(stmt) => self.gen_stmt(&mut top, stmt)?,
            }
        }
        if top.pending_label.is_some() {
            top.emit("PASS");
        }
        let mut out = String::new();
        for body in &self.funcs {
            out.push_str(body);
        }
        out.push_str(&top.out);
        Ok(out)
    }

    fn gen_fdef(&mut self, fdef: &Fdef) -> Result<(), GenError> {
        let mut scope = Scope::function();
        scope.emit("PROC");
        {
            let locals = scope.locals.as_mut().unwrap();
            for (idx, param) in fdef.params.iter().enumerate() {
                locals.insert(param.clone(), idx as u8);
            }
        }
        let n = fdef.params.len();
        for idx in (0..n).rev() {
            scope.emit(&format!("STORE_VAR {}", idx));
        }
        self.gen_block(&mut scope, &fdef.block)?;
        if scope.pending_label.is_some() {
            scope.emit("PASS");
        }
        scope.emit("MAKE_FUNCTION");
        self.func_names
            .insert(fdef.name.clone(), self.funcs.len() as u8);
        self.funcs.push(scope.out);
        Ok(())
    }

    fn gen_block(&mut self, scope: &mut Scope, block: &Block) -> Result<(), GenError> {
        for stmt in &block.stmts {
            self.gen_stmt(scope, stmt)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, scope: &mut Scope, stmt: &Stmt) -> Result<(), GenError> {
        match stmt {
            Stmt::Assign(assign) => self.gen_assign(scope, assign),
            Stmt::Fcall(fcall) => self.gen_fcall(scope, fcall).map(|_| ()),
            Stmt::Return(ret) => self.gen_return(scope, ret),
            Stmt::Pass => {
                scope.emit("PASS");
                Ok(())
            }
            Stmt::IfChain(chain) => self.gen_if_chain(scope, chain),
            Stmt::ValueExpr(expr) => self.gen_value_expr(scope, expr),
        }
    }

    fn gen_assign(&mut self, scope: &mut Scope, assign: &Assign) -> Result<(), GenError> {
        self.gen_value_expr(scope, &assign.value)?;
        self.store(scope, &assign.var);
        Ok(())
    }

    fn store(&mut self, scope: &mut Scope, name: &str) {
        if let Some(locals) = scope.locals.as_mut() {
            let idx = *locals
                .entry(name.to_string())
                .or_insert_with(|| locals.len() as u8);
            scope.emit(&format!("STORE_VAR {}", idx));
            return;
        }
        let idx = *self
            .globals
            .entry(name.to_string())
            .or_insert_with(|| self.globals.len() as u8);
        scope.emit(&format!("STORE_GLOBAL {}", idx));
    }

    fn load_var(&mut self, scope: &mut Scope, var: &Var) -> Result<(), GenError> {
        if let Some(locals) = &scope.locals {
            if let Some(idx) = locals.get(&var.name) {
                scope.emit(&format!("LOAD_LOCAL {}", idx));
                return Ok(());
            }
        }
        if let Some(idx) = self.globals.get(&var.name) {
            scope.emit(&format!("LOAD_GLOBAL {}", idx));
            return Ok(());
        }
        Err(GenError::UnknownName(var.name.clone()))
    }

    fn gen_fcall(&mut self, scope: &mut Scope, fcall: &Fcall) -> Result<(), GenError> {
        for arg in &fcall.args {
            self.gen_value_expr(scope, arg)?;
        }
        if fcall.name == "print" {
            scope.emit(&format!("CALL_BUILTIN {}", BUILTIN_PRINT));
            return Ok(());
        }
        match self.func_names.get(&fcall.name) {
            Some(idx) => {
                scope.emit(&format!("CALL {}", idx));
                Ok(())
            }
            None => Err(GenError::UnknownName(fcall.name.clone())),
        }
    }

    fn gen_return(&mut self, scope: &mut Scope, ret: &ReturnStmt) -> Result<(), GenError> {
        if let Some(value) = &ret.value {
            self.gen_value_expr(scope, value)?;
        }
        scope.emit("RETN");
        Ok(())
    }

    fn gen_if_chain(&mut self, scope: &mut Scope, chain: &IfChain) -> Result<(), GenError> {
        scope.enter_chain();
        let out_label = scope.next_label("out");
        let last = chain.branches.len() - 1;
        for (i, branch) in chain.branches.iter().enumerate() {
            self.gen_value_expr(scope, &branch.cond)?;
            let is_final_without_else = i == last && chain.else_branch.is_none();
            let next_label = if is_final_without_else {
                out_label.clone()
            } else {
                scope.next_label(&format!("next{}", i))
            };
            scope.emit(&format!("JZ {}", next_label));
            self.gen_block(scope, &branch.block)?;
            if !is_final_without_else {
                scope.emit(&format!("JMP {}", out_label));
                scope.pending_label = Some(next_label);
            }
        }
        if let Some(else_block) = &chain.else_branch {
            self.gen_block(scope, else_block)?;
        }
        scope.pending_label = Some(out_label);
        scope.exit_chain();
        Ok(())
    }

    fn gen_value_expr(&mut self, scope: &mut Scope, expr: &ValueExpr) -> Result<(), GenError> {
        match expr {
            ValueExpr::Value(vs) => self.gen_value_stmt(scope, vs),
            ValueExpr::Cmp(cmp) => self.gen_cmp_stmt(scope, cmp),
        }
    }

    fn gen_cmp_stmt(&mut self, scope: &mut Scope, cmp: &CmpStmt) -> Result<(), GenError> {
        self.gen_value_stmt(scope, &cmp.right)?;
        self.gen_value_stmt(scope, &cmp.left)?;
        scope.emit(&format!("CMP {}", cmp_opcode(cmp.op)));
        Ok(())
    }

    /// Emits a flat, left-associative operator chain. The stack machine pops the
    /// left operand first (top of stack) and the right operand second, so to fold
    /// `v0 op1 v1 op2 v2 ... opn vn` left-associatively we push every operand in
    /// reverse order (vn .. v0) and then apply the operators in forward order
    /// (op1 .. opn): each `opi` always combines whatever is already on the stack
    /// (the left-associative result so far) with the next operand underneath it.
    fn gen_value_stmt(&mut self, scope: &mut Scope, vs: &ValueStmt) -> Result<(), GenError> {
        let operands: Vec<&Operand> = vs
            .items
            .iter()
            .filter_map(|item| match item {
                ValueItem::Operand(op) => Some(op),
                ValueItem::Operator(_) => None,
            })
            .collect();
        let operators: Vec<Operator> = vs
            .items
            .iter()
            .filter_map(|item| match item {
                ValueItem::Operator(op) => Some(*op),
                ValueItem::Operand(_) => None,
            })
            .collect();

        for operand in operands.iter().rev() {
            self.gen_operand(scope, operand)?;
        }
        for operator in &operators {
            scope.emit(operator_mnemonic(*operator));
        }
        Ok(())
    }

    fn gen_operand(&mut self, scope: &mut Scope, operand: &Operand) -> Result<(), GenError> {
        match operand {
            Operand::Value(value) => self.gen_value(scope, value),
            Operand::Nested(nested) => self.gen_value_stmt(scope, nested),
            Operand::Cmp(cmp) => self.gen_cmp_stmt(scope, cmp),
        }
    }

    fn gen_value(&mut self, scope: &mut Scope, value: &Value) -> Result<(), GenError> {
        match value {
            Value::Number(number) => {
                scope.emit(&format!("LOAD_CONST {}", number_literal(number)));
                Ok(())
            }
            Value::Literal(literal) => {
                scope.emit(&format!("LOAD_CONST {}", quote_literal(&literal.text)));
                Ok(())
            }
            Value::Var(var) => self.load_var(scope, var),
            Value::Fcall(fcall) => self.gen_fcall(scope, fcall),
        }
    }
}

fn operator_mnemonic(op: Operator) -> &'static str {
    match op {
        Operator::Plus => "ADD",
        Operator::Minus => "SUB",
        Operator::Times => "MULT",
        Operator::Slash => "DIV",
    }
}

fn cmp_opcode(op: CmpOp) -> u8 {
    match op {
        CmpOp::IsEqual => 0,
        CmpOp::NotEqual => 1,
        CmpOp::Gt => 2,
        CmpOp::Gte => 3,
        CmpOp::Lt => 4,
        CmpOp::Lte => 5,
    }
}

/// Already-evaluated number literals (hex/binary prefixes are resolved at parse
/// time) are always emitted as plain decimal text; the assembler has no notion
/// of hex or binary constant syntax.
fn number_literal(number: &Number) -> String {
    match number.value {
        NumberValue::Int(i) => i.to_string(),
        NumberValue::Float(f) => {
            if f.fract() == 0.0 {
                format!("{:.1}", f)
            } else {
                f.to_string()
            }
        }
    }
}

/// Wraps in single quotes, escaping any embedded single quote with a backslash.
fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        if ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}
