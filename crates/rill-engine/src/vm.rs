use rill_io::IoError;
use rill_table::{ColumnData, Table, TableError};
use rill_types::{DType, Value};
use thiserror::Error;
use tracing::debug;

use crate::ir::{CmpOp, ExecutionPlan, FilterScalar, Instr, IrExpr, PhysicalOp};
use crate::kernels::{self, holds};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("Filter predicate must return boolean")]
    NonBooleanPredicate,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Cannot {0} non-numeric types")]
    NonNumericArithmetic(&'static str),
    #[error("Cannot negate non-numeric value")]
    NonNumericNegation,
    #[error("Cannot apply NOT to non-boolean value")]
    NonBooleanNot,
    #[error("Cannot compare incompatible types")]
    IncomparableTypes,
    #[error("Cannot order boolean values")]
    BooleanOrdering,
    #[error("Expression evaluation error: invalid stack state")]
    InvalidStack,
    #[error("Type mismatch: cannot filter {dtype} column '{column}' with the given scalar")]
    VectorizedTypeMismatch { column: String, dtype: DType },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Io(#[from] IoError),
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
        }
    }

    fn apply_int(self, a: i64, b: i64) -> i64 {
        match self {
            Self::Add => a.wrapping_add(b),
            Self::Sub => a.wrapping_sub(b),
            Self::Mul => a.wrapping_mul(b),
            // Truncates toward zero.
            Self::Div => a.wrapping_div(b),
        }
    }

    fn apply_float(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }
}

/// Null propagates through arithmetic. Two ints stay in int; any numeric
/// mix widens to float; division by zero is an error in either width.
fn arithmetic(op: ArithOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int64(a), Value::Int64(b)) = (&left, &right) {
        if matches!(op, ArithOp::Div) && *b == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        return Ok(Value::Int64(op.apply_int(*a, *b)));
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(RuntimeError::NonNumericArithmetic(op.verb()));
    };
    if matches!(op, ArithOp::Div) && b == 0.0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(Value::Float64(op.apply_float(a, b)))
}

/// SQL-style comparison: any null operand yields the unknown result,
/// `Null`. The filter acceptance rule collapses unknown to discard, and
/// `NOT` collapses it to false, so null rows stay invisible to simple
/// predicates and their negations alike. Booleans only support equality;
/// ordering them is an error, as is any other mixed non-numeric pairing.
fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let outcome = match (left, right) {
        (Value::Int64(a), Value::Int64(b)) => holds(op, a, b),
        (Value::Utf8(a), Value::Utf8(b)) => holds(op, a.as_str(), b.as_str()),
        (Value::Bool(a), Value::Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Neq => a != b,
            _ => return Err(RuntimeError::BooleanOrdering),
        },
        _ => {
            let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                return Err(RuntimeError::IncomparableTypes);
            };
            holds(op, &a, &b)
        }
    };
    Ok(Value::Bool(outcome))
}

/// Executes a plan operator by operator against a single current table.
/// Each operator replaces the table; the previous one is released.
#[derive(Debug, Default)]
pub struct Vm {
    current: Table,
    stack: Vec<Value>,
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Table::empty(),
            stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn current_table(&self) -> &Table {
        &self.current
    }

    pub fn execute(&mut self, plan: &ExecutionPlan) -> Result<(), RuntimeError> {
        for op in &plan.operators {
            match op {
                PhysicalOp::Scan { path } => {
                    self.current = rill_io::read_csv(path)?;
                    debug!(%path, rows = self.current.num_rows(), "scan");
                }
                PhysicalOp::Filter { predicate } => {
                    self.filter(predicate)?;
                    debug!(rows = self.current.num_rows(), "filter");
                }
                PhysicalOp::VectorizedFilter { column, op, value } => {
                    self.vectorized_filter(column, *op, value)?;
                    debug!(%column, rows = self.current.num_rows(), "vectorized filter");
                }
                PhysicalOp::Project { columns } => {
                    self.current = self.current.project(columns)?;
                }
                PhysicalOp::Write { path } => {
                    rill_io::write_csv(path, &self.current)?;
                    debug!(%path, rows = self.current.num_rows(), "write");
                }
            }
        }
        Ok(())
    }

    fn filter(&mut self, predicate: &IrExpr) -> Result<(), RuntimeError> {
        let mut selection = Vec::with_capacity(self.current.num_rows());
        for row in 0..self.current.num_rows() {
            let keep = match self.eval(predicate, row)? {
                Value::Null => false,
                Value::Bool(flag) => flag,
                Value::Int64(value) => value != 0,
                Value::Float64(_) | Value::Utf8(_) => {
                    return Err(RuntimeError::NonBooleanPredicate)
                }
            };
            selection.push(keep);
        }
        self.current = self.current.take_rows(&selection)?;
        Ok(())
    }

    fn vectorized_filter(
        &mut self,
        column: &str,
        op: CmpOp,
        value: &FilterScalar,
    ) -> Result<(), RuntimeError> {
        let col = self
            .current
            .column(column)
            .ok_or_else(|| RuntimeError::ColumnNotFound(column.to_owned()))?;

        if self.current.num_rows() == 0 {
            return Ok(());
        }

        let selection = match (col.data(), value) {
            (ColumnData::Int64(values), FilterScalar::Int64(scalar)) => {
                kernels::compare_int64(values, op, *scalar)
            }
            (ColumnData::Int64(values), FilterScalar::Float64(scalar)) => {
                kernels::compare_int64_as_float(values, op, *scalar)
            }
            (ColumnData::Float64(values), FilterScalar::Float64(scalar)) => {
                kernels::compare_float64(values, op, *scalar)
            }
            (ColumnData::Float64(values), FilterScalar::Int64(scalar)) => {
                kernels::compare_float64(values, op, *scalar as f64)
            }
            (ColumnData::Utf8(values), FilterScalar::Utf8(scalar)) => {
                kernels::compare_utf8(values, op, scalar)
            }
            _ => {
                return Err(RuntimeError::VectorizedTypeMismatch {
                    column: column.to_owned(),
                    dtype: col.dtype(),
                })
            }
        };

        self.current = self.current.take_rows(&selection)?;
        Ok(())
    }

    /// Interpret an expression's bytecode for one row with a fresh stack.
    /// Exactly one value must remain at the end.
    fn eval(&mut self, expr: &IrExpr, row: usize) -> Result<Value, RuntimeError> {
        self.stack.clear();

        for instr in &expr.instructions {
            match instr {
                Instr::PushInt(value) => self.stack.push(Value::Int64(*value)),
                Instr::PushFloat(value) => self.stack.push(Value::Float64(*value)),
                Instr::PushStr(value) => self.stack.push(Value::Utf8(value.clone())),
                Instr::PushBool(value) => self.stack.push(Value::Bool(*value)),
                Instr::LoadColumn(name) => {
                    let column = self
                        .current
                        .column(name)
                        .ok_or_else(|| RuntimeError::ColumnNotFound(name.clone()))?;
                    self.stack.push(column.value(row));
                }
                Instr::Add => self.binary_arith(ArithOp::Add)?,
                Instr::Sub => self.binary_arith(ArithOp::Sub)?,
                Instr::Mul => self.binary_arith(ArithOp::Mul)?,
                Instr::Div => self.binary_arith(ArithOp::Div)?,
                Instr::Neg => {
                    let value = match self.pop()? {
                        Value::Null => Value::Null,
                        Value::Int64(v) => Value::Int64(v.wrapping_neg()),
                        Value::Float64(v) => Value::Float64(-v),
                        Value::Utf8(_) | Value::Bool(_) => {
                            return Err(RuntimeError::NonNumericNegation)
                        }
                    };
                    self.stack.push(value);
                }
                Instr::Not => {
                    let value = match self.pop()? {
                        // Unknown collapses to false under NOT as well.
                        Value::Null => Value::Bool(false),
                        Value::Bool(v) => Value::Bool(!v),
                        Value::Int64(v) => Value::Bool(v == 0),
                        Value::Float64(_) | Value::Utf8(_) => {
                            return Err(RuntimeError::NonBooleanNot)
                        }
                    };
                    self.stack.push(value);
                }
                Instr::Eq => self.binary_compare(CmpOp::Eq)?,
                Instr::Neq => self.binary_compare(CmpOp::Neq)?,
                Instr::Lt => self.binary_compare(CmpOp::Lt)?,
                Instr::Gt => self.binary_compare(CmpOp::Gt)?,
                Instr::Lte => self.binary_compare(CmpOp::Lte)?,
                Instr::Gte => self.binary_compare(CmpOp::Gte)?,
            }
        }

        if self.stack.len() != 1 {
            return Err(RuntimeError::InvalidStack);
        }
        self.stack.pop().ok_or(RuntimeError::InvalidStack)
    }

    fn binary_arith(&mut self, op: ArithOp) -> Result<(), RuntimeError> {
        let (left, right) = self.pop_pair()?;
        self.stack.push(arithmetic(op, left, right)?);
        Ok(())
    }

    fn binary_compare(&mut self, op: CmpOp) -> Result<(), RuntimeError> {
        let (left, right) = self.pop_pair()?;
        self.stack.push(compare(op, &left, &right)?);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::InvalidStack)
    }

    /// Binary operators pop right then left.
    fn pop_pair(&mut self) -> Result<(Value, Value), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        Ok((left, right))
    }
}
