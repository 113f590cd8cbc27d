use crate::artifact::EvalContext;
use crate::error::EvalError;
use crate::schema::DataRow;
use crate::value::Value;

use super::program::{OpCode, Program};

struct SetIter {
    items: Vec<Value>,
    next: usize,
}

/// Stack-based bytecode interpreter.
#[derive(Default)]
pub struct Vm {
    stack: Vec<Value>,
    locals: Vec<Option<Value>>,
    iters: Vec<SetIter>,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(stack: usize) -> Self {
        Self {
            stack: Vec::with_capacity(stack),
            locals: Vec::new(),
            iters: Vec::new(),
        }
    }

    fn pop(&mut self) -> Result<Value, EvalError> {
        self.stack
            .pop()
            .ok_or_else(|| EvalError::Program("stack underflow".into()))
    }

    fn split_top(&mut self, n: usize) -> Result<Vec<Value>, EvalError> {
        let start = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| EvalError::Program(format!("stack underflow taking {n} values")))?;
        Ok(self.stack.split_off(start))
    }

    pub fn eval(
        &mut self,
        program: &Program,
        ctx: &EvalContext,
        row: &dyn DataRow,
    ) -> Result<Value, EvalError> {
        self.stack.clear();
        self.iters.clear();
        self.locals.clear();
        self.locals.resize(program.local_count(), None);

        let instrs = program.instrs();
        let mut pc = 0usize;
        while let Some(&inst) = instrs.get(pc) {
            pc += 1;
            match inst.op() {
                OpCode::PushConst => {
                    let v = program
                        .consts
                        .get(inst.a() as usize)
                        .ok_or_else(|| EvalError::Program("constant out of range".into()))?;
                    self.stack.push(v.clone());
                }
                OpCode::LoadProperty => {
                    let slot = program
                        .properties
                        .get(inst.a() as usize)
                        .ok_or_else(|| EvalError::Program("property slot out of range".into()))?;
                    let value = row.get_property(&slot.name).ok_or_else(|| {
                        EvalError::MissingProperty {
                            name: slot.name.clone(),
                        }
                    })?;
                    if !value.conforms_to(&slot.data_type) {
                        return Err(EvalError::PropertyTypeMismatch {
                            name: slot.name.clone(),
                            expected: slot.data_type.clone(),
                            found: value.kind_name().to_string(),
                        });
                    }
                    self.stack.push(value.clone());
                }
                OpCode::LoadLocal => {
                    let v = self
                        .locals
                        .get(inst.a() as usize)
                        .and_then(Option::as_ref)
                        .ok_or_else(|| EvalError::Program("local read before binding".into()))?;
                    self.stack.push(v.clone());
                }
                OpCode::MakeSet => {
                    let items = self.split_top(inst.a() as usize)?;
                    self.stack.push(Value::Set(items));
                }
                OpCode::AppendSet => {
                    let v = self.pop()?;
                    match self.stack.last_mut() {
                        Some(Value::Set(items)) => items.push(v),
                        _ => return Err(EvalError::Program("append target is not a set".into())),
                    }
                }
                OpCode::CallFunc => {
                    let func = program
                        .funcs
                        .get(inst.a() as usize)
                        .ok_or_else(|| EvalError::Program("function out of range".into()))?;
                    let args = self.split_top(inst.b() as usize)?;
                    let result = (func.implementation)(ctx, &args)?;
                    self.stack.push(result);
                }
                OpCode::IterBegin => match self.pop()? {
                    Value::Set(items) => self.iters.push(SetIter { items, next: 0 }),
                    other => {
                        return Err(EvalError::Program(format!(
                            "cannot iterate over {}",
                            other.kind_name()
                        )))
                    }
                },
                OpCode::IterNext => {
                    let iter = self
                        .iters
                        .last_mut()
                        .ok_or_else(|| EvalError::Program("iter_next outside a loop".into()))?;
                    match iter.items.get(iter.next) {
                        Some(item) => {
                            let item = item.clone();
                            iter.next += 1;
                            let slot = self.locals.get_mut(inst.a() as usize).ok_or_else(|| {
                                EvalError::Program("loop variable out of range".into())
                            })?;
                            *slot = Some(item);
                        }
                        None => pc += inst.b() as usize,
                    }
                }
                OpCode::IterEnd => {
                    if self.iters.pop().is_none() {
                        return Err(EvalError::Program("iter_end outside a loop".into()));
                    }
                }
                OpCode::JumpBack => {
                    pc = pc
                        .checked_sub(inst.a() as usize)
                        .ok_or_else(|| EvalError::Program("jump before program start".into()))?;
                }
                OpCode::JumpIfFalse => match self.pop()? {
                    Value::Bool(true) => {}
                    Value::Bool(false) => pc += inst.a() as usize,
                    other => {
                        return Err(EvalError::Program(format!(
                            "branch condition is {}, not bool",
                            other.kind_name()
                        )))
                    }
                },
            }
        }

        let result = self.pop()?;
        if !self.stack.is_empty() {
            return Err(EvalError::Program(format!(
                "{} values left on the stack",
                self.stack.len()
            )));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Instruction;
    use crate::schema::Row;
    use std::sync::Arc;

    fn run(program: &Program) -> Result<Value, EvalError> {
        Vm::new().eval(program, &EvalContext::default(), &Row::new())
    }

    #[test]
    fn hand_built_loop_copies_every_element() {
        // [1, 2] iterated into a fresh set without a predicate.
        let mut program = Program::new(Arc::from("copy"));
        let one = program.add_const(Value::Number(1.0));
        let two = program.add_const(Value::Number(2.0));
        let x = program.alloc_local(Arc::from("x"));
        program.instrs = vec![
            Instruction::make_set(0),
            Instruction::push_const(one),
            Instruction::push_const(two),
            Instruction::make_set(2),
            Instruction::iter_begin(),
            Instruction::iter_next(x, 3),
            Instruction::load_local(x),
            Instruction::append_set(),
            Instruction::jump_back(4),
            Instruction::iter_end(),
        ];
        assert_eq!(
            run(&program),
            Ok(Value::Set(vec![Value::Number(1.0), Value::Number(2.0)]))
        );
    }

    #[test]
    fn malformed_programs_error_instead_of_panicking() {
        let mut program = Program::new(Arc::from("bad"));
        program.instrs = vec![Instruction::append_set()];
        assert!(matches!(run(&program), Err(EvalError::Program(_))));

        program.instrs = vec![Instruction::jump_back(5)];
        assert!(matches!(run(&program), Err(EvalError::Program(_))));
    }
}
