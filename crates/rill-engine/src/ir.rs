use serde::{Deserialize, Serialize};

/// One stack-machine instruction. Push and load instructions carry their
/// operand; operator instructions work purely on the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "operand", rename_all = "snake_case")]
pub enum Instr {
    PushInt(i64),
    PushFloat(f64),
    PushStr(String),
    PushBool(bool),
    /// Column lookup is by name; the VM resolves it against the current
    /// table at execution time.
    LoadColumn(String),
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Not,
}

/// Compiled expression: an instruction sequence that, run against a row
/// with an empty stack, leaves exactly one value behind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IrExpr {
    pub instructions: Vec<Instr>,
}

/// Comparison operator of a vectorized filter, always in the canonical
/// `column op scalar` orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CmpOp {
    /// Mirror the operator for the `scalar op column` orientation, so
    /// `30 < age` canonicalizes to `age > 30`.
    #[must_use]
    pub fn reflect(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Lte => Self::Gte,
            Self::Gte => Self::Lte,
            Self::Eq => Self::Eq,
            Self::Neq => Self::Neq,
        }
    }
}

/// Scalar operand of a vectorized filter. Booleans are deliberately
/// absent: boolean comparisons always take the scalar fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterScalar {
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

/// One step of the execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhysicalOp {
    Scan {
        path: String,
    },
    Filter {
        predicate: IrExpr,
    },
    VectorizedFilter {
        column: String,
        op: CmpOp,
        value: FilterScalar,
    },
    Project {
        columns: Vec<String>,
    },
    Write {
        path: String,
    },
}

/// Ordered physical operators, executed sequentially against a single
/// current table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub operators: Vec<PhysicalOp>,
}
