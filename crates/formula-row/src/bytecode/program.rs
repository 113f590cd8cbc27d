use std::fmt;
use std::sync::Arc;

use crate::functions::{DirectImpl, Volatility};
use crate::types::DataType;
use crate::value::Value;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    PushConst = 0,
    LoadProperty = 1,
    LoadLocal = 2,
    MakeSet = 3,
    AppendSet = 4,
    CallFunc = 5,
    IterBegin = 6,
    IterNext = 7,
    IterEnd = 8,
    JumpBack = 9,
    JumpIfFalse = 10,
}

impl OpCode {
    fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => OpCode::PushConst,
            1 => OpCode::LoadProperty,
            2 => OpCode::LoadLocal,
            3 => OpCode::MakeSet,
            4 => OpCode::AppendSet,
            5 => OpCode::CallFunc,
            6 => OpCode::IterBegin,
            7 => OpCode::IterNext,
            8 => OpCode::IterEnd,
            9 => OpCode::JumpBack,
            10 => OpCode::JumpIfFalse,
            _ => return None,
        })
    }
}

/// Largest value an instruction operand can hold.
pub const MAX_OPERAND: u32 = (1 << 28) - 1;

/// Packed instruction:
/// - bits 56..63: opcode
/// - bits 28..55: operand a
/// - bits 0..27: operand b
///
/// Jump offsets are relative to the instruction that follows the jump, so code fragments can be
/// spliced together without relocation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction(u64);

impl Instruction {
    #[inline]
    pub fn new(op: OpCode, a: u32, b: u32) -> Self {
        debug_assert!(a <= MAX_OPERAND);
        debug_assert!(b <= MAX_OPERAND);
        Instruction(((op as u64) << 56) | ((a as u64) << 28) | (b as u64))
    }

    #[inline]
    pub fn op(self) -> OpCode {
        match OpCode::from_u8(((self.0 >> 56) & 0xFF) as u8) {
            Some(op) => op,
            None => unreachable!("invalid opcode"),
        }
    }

    #[inline]
    pub fn a(self) -> u32 {
        ((self.0 >> 28) & 0x0FFF_FFFF) as u32
    }

    #[inline]
    pub fn b(self) -> u32 {
        (self.0 & 0x0FFF_FFFF) as u32
    }

    pub fn push_const(idx: u32) -> Self {
        Self::new(OpCode::PushConst, idx, 0)
    }

    pub fn load_property(idx: u32) -> Self {
        Self::new(OpCode::LoadProperty, idx, 0)
    }

    pub fn load_local(slot: u32) -> Self {
        Self::new(OpCode::LoadLocal, slot, 0)
    }

    pub fn make_set(len: usize) -> Self {
        Self::new(OpCode::MakeSet, operand(len), 0)
    }

    pub fn append_set() -> Self {
        Self::new(OpCode::AppendSet, 0, 0)
    }

    pub fn call(func: u32, argc: usize) -> Self {
        Self::new(OpCode::CallFunc, func, operand(argc))
    }

    pub fn iter_begin() -> Self {
        Self::new(OpCode::IterBegin, 0, 0)
    }

    /// Bind the next element of the innermost iteration to `slot`, or skip `exit` instructions
    /// once the set is exhausted.
    pub fn iter_next(slot: u32, exit: usize) -> Self {
        Self::new(OpCode::IterNext, slot, operand(exit))
    }

    pub fn iter_end() -> Self {
        Self::new(OpCode::IterEnd, 0, 0)
    }

    pub fn jump_back(offset: usize) -> Self {
        Self::new(OpCode::JumpBack, operand(offset), 0)
    }

    pub fn jump_if_false(offset: usize) -> Self {
        Self::new(OpCode::JumpIfFalse, operand(offset), 0)
    }
}

fn operand(n: usize) -> u32 {
    debug_assert!(n <= MAX_OPERAND as usize, "operand {n} does not fit in 28 bits");
    n.min(MAX_OPERAND as usize) as u32
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}, {})", self.op(), self.a(), self.b())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertySlot {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Clone, Copy)]
pub struct FuncSlot {
    pub name: &'static str,
    pub volatility: Volatility,
    pub implementation: DirectImpl,
}

impl fmt::Debug for FuncSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncSlot")
            .field("name", &self.name)
            .field("volatility", &self.volatility)
            .finish_non_exhaustive()
    }
}

/// Table state captured before a speculative parse; see [`Program::rollback`].
///
/// Two equal checkpoints taken during one compilation denote identical table contents: every
/// mutation moves the program to a fresh revision and a rollback restores the old one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Checkpoint {
    consts: usize,
    properties: usize,
    funcs: usize,
    locals: usize,
    revision: u64,
}

/// Table entries added after a checkpoint, replayable onto a program rolled back to it.
#[derive(Clone, Debug)]
pub(crate) struct TableDelta {
    consts: Vec<Value>,
    properties: Vec<PropertySlot>,
    funcs: Vec<FuncSlot>,
    locals: Vec<Arc<str>>,
    revision: u64,
}

#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) instrs: Vec<Instruction>,
    pub(crate) consts: Vec<Value>,
    pub(crate) properties: Vec<PropertySlot>,
    pub(crate) funcs: Vec<FuncSlot>,
    pub(crate) locals: Vec<Arc<str>>,
    pub(crate) source: Arc<str>,
    revision: u64,
    last_revision: u64,
}

impl Program {
    pub fn new(source: Arc<str>) -> Self {
        Self {
            instrs: Vec::new(),
            consts: Vec::new(),
            properties: Vec::new(),
            funcs: Vec::new(),
            locals: Vec::new(),
            source,
            revision: 0,
            last_revision: 0,
        }
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn instrs(&self) -> &[Instruction] {
        &self.instrs
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn is_volatile(&self) -> bool {
        self.funcs
            .iter()
            .any(|f| f.volatility == Volatility::Volatile)
    }

    fn touch(&mut self) {
        self.last_revision += 1;
        self.revision = self.last_revision;
    }

    pub(crate) fn add_const(&mut self, value: Value) -> u32 {
        self.touch();
        let idx = self.consts.len() as u32;
        self.consts.push(value);
        idx
    }

    pub(crate) fn add_property(&mut self, name: &str, data_type: &DataType) -> u32 {
        if let Some(idx) = self
            .properties
            .iter()
            .position(|p| p.name == name && &p.data_type == data_type)
        {
            return idx as u32;
        }
        self.touch();
        let idx = self.properties.len() as u32;
        self.properties.push(PropertySlot {
            name: name.to_string(),
            data_type: data_type.clone(),
        });
        idx
    }

    pub(crate) fn add_func(&mut self, slot: FuncSlot) -> u32 {
        self.touch();
        let idx = self.funcs.len() as u32;
        self.funcs.push(slot);
        idx
    }

    pub(crate) fn alloc_local(&mut self, name: Arc<str>) -> u32 {
        self.touch();
        let idx = self.locals.len() as u32;
        self.locals.push(name);
        idx
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            consts: self.consts.len(),
            properties: self.properties.len(),
            funcs: self.funcs.len(),
            locals: self.locals.len(),
            revision: self.revision,
        }
    }

    /// Drop every table entry added since `cp`.
    pub(crate) fn rollback(&mut self, cp: Checkpoint) {
        self.consts.truncate(cp.consts);
        self.properties.truncate(cp.properties);
        self.funcs.truncate(cp.funcs);
        self.locals.truncate(cp.locals);
        self.revision = cp.revision;
    }

    /// Copy of every table entry added since `cp`.
    pub(crate) fn entries_since(&self, cp: Checkpoint) -> TableDelta {
        TableDelta {
            consts: self.consts[cp.consts..].to_vec(),
            properties: self.properties[cp.properties..].to_vec(),
            funcs: self.funcs[cp.funcs..].to_vec(),
            locals: self.locals[cp.locals..].to_vec(),
            revision: self.revision,
        }
    }

    /// Re-append `delta`. The program must be at the checkpoint the delta was taken from, so
    /// every replayed entry lands at its original index.
    pub(crate) fn replay(&mut self, delta: &TableDelta) {
        self.consts.extend(delta.consts.iter().cloned());
        self.properties.extend(delta.properties.iter().cloned());
        self.funcs.extend(delta.funcs.iter().copied());
        self.locals.extend(delta.locals.iter().cloned());
        self.revision = delta.revision;
    }
}

impl fmt::Display for Program {
    /// Human-readable disassembly, one instruction per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pc, inst) in self.instrs.iter().enumerate() {
            let (a, b) = (inst.a(), inst.b());
            write!(f, "{pc:04} ")?;
            match inst.op() {
                OpCode::PushConst => match self.consts.get(a as usize) {
                    Some(Value::Text(s)) => write!(f, "push_const {a:<6} ; {s:?}")?,
                    Some(v) => write!(f, "push_const {a:<6} ; {v}")?,
                    None => write!(f, "push_const {a:<6} ; ?")?,
                },
                OpCode::LoadProperty => match self.properties.get(a as usize) {
                    Some(p) => write!(f, "load_prop  {a:<6} ; {}: {}", p.name, p.data_type)?,
                    None => write!(f, "load_prop  {a:<6} ; ?")?,
                },
                OpCode::LoadLocal => write!(f, "load_local {a:<6} ; {}", self.local_name(a))?,
                OpCode::MakeSet => write!(f, "make_set   {a}")?,
                OpCode::AppendSet => f.write_str("append_set")?,
                OpCode::CallFunc => {
                    let name = self.funcs.get(a as usize).map_or("?", |s| s.name);
                    write!(f, "call       {a:<6} ; {name}/{b}")?
                }
                OpCode::IterBegin => f.write_str("iter_begin")?,
                OpCode::IterNext => write!(
                    f,
                    "iter_next  {a:<6} ; {} else -> {:04}",
                    self.local_name(a),
                    pc + 1 + b as usize
                )?,
                OpCode::IterEnd => f.write_str("iter_end")?,
                OpCode::JumpBack => write!(
                    f,
                    "jump_back  -> {:04}",
                    (pc + 1).saturating_sub(a as usize)
                )?,
                OpCode::JumpIfFalse => {
                    write!(f, "jump_false -> {:04}", pc + 1 + a as usize)?
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Program {
    fn local_name(&self, slot: u32) -> &str {
        self.locals.get(slot as usize).map_or("?", |n| &**n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_packing_round_trips_operands() {
        let inst = Instruction::new(OpCode::IterNext, MAX_OPERAND, 17);
        assert_eq!(inst.op(), OpCode::IterNext);
        assert_eq!(inst.a(), MAX_OPERAND);
        assert_eq!(inst.b(), 17);
    }

    #[test]
    fn opcode_table_is_dense() {
        let ops: Vec<_> = (0..=u8::MAX).filter_map(OpCode::from_u8).collect();
        assert_eq!(ops.len(), 11);
        assert_eq!(ops.last(), Some(&OpCode::JumpIfFalse));
        for (raw, op) in ops.iter().enumerate() {
            assert_eq!(*op as usize, raw);
        }
    }

    #[test]
    fn rollback_discards_speculative_entries() {
        let mut program = Program::new(Arc::from("x"));
        program.add_const(Value::Number(1.0));
        let cp = program.checkpoint();
        program.add_const(Value::Number(2.0));
        program.add_property("p", &DataType::NUMBER);
        program.alloc_local(Arc::from("x"));
        program.rollback(cp);
        assert_eq!(program.consts, vec![Value::Number(1.0)]);
        assert!(program.properties.is_empty());
        assert_eq!(program.local_count(), 0);
    }

    #[test]
    fn replayed_entries_restore_the_checkpointed_state() {
        let mut program = Program::new(Arc::from("x"));
        let start = program.checkpoint();
        program.add_const(Value::Number(1.0));
        program.add_property("p", &DataType::NUMBER);
        program.alloc_local(Arc::from("x"));
        let end = program.checkpoint();
        let delta = program.entries_since(start);

        program.rollback(start);
        assert_eq!(program.checkpoint(), start);
        program.replay(&delta);
        assert_eq!(program.checkpoint(), end);
        assert_eq!(program.consts, vec![Value::Number(1.0)]);
        assert_eq!(program.add_property("p", &DataType::NUMBER), 0);
    }

    #[test]
    fn same_lengths_after_different_edits_are_different_checkpoints() {
        let mut program = Program::new(Arc::from("x"));
        let start = program.checkpoint();
        program.add_const(Value::Number(1.0));
        let first = program.checkpoint();
        program.rollback(start);
        program.add_const(Value::Number(2.0));
        assert_ne!(program.checkpoint(), first);
    }

    #[test]
    fn property_slots_are_shared() {
        let mut program = Program::new(Arc::from("x"));
        let a = program.add_property("p", &DataType::NUMBER);
        let b = program.add_property("p", &DataType::NUMBER);
        assert_eq!(a, b);
    }
}
