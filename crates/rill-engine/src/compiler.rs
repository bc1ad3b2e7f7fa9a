use rill_lang::{BinaryOp, Expr, Literal, Program, Stmt, UnaryOp};
use thiserror::Error;
use tracing::debug;

use crate::ir::{CmpOp, ExecutionPlan, FilterScalar, Instr, IrExpr, PhysicalOp};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("pipeline must begin with a 'from' statement")]
    MissingSource,
    #[error("projection must name at least one column")]
    EmptyProjection,
}

/// Lower a program to an execution plan, one physical operator per
/// statement in order. Filters are offered to the vectorization detector
/// first and fall back to compiled bytecode.
///
/// The parser already guarantees a leading `from` and non-empty column
/// lists; the checks here cover programs built directly as data.
pub fn compile(program: &Program) -> Result<ExecutionPlan, CompileError> {
    if !matches!(program.statements.first(), Some(Stmt::From { .. })) {
        return Err(CompileError::MissingSource);
    }

    let operators = program
        .statements
        .iter()
        .map(compile_stmt)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ExecutionPlan { operators })
}

fn compile_stmt(stmt: &Stmt) -> Result<PhysicalOp, CompileError> {
    let op = match stmt {
        Stmt::From { path } => PhysicalOp::Scan { path: path.clone() },
        Stmt::Filter { predicate } => match detect_vectorized_filter(predicate) {
            Some((column, op, value)) => {
                debug!(%column, "filter compiled to vectorized comparison");
                PhysicalOp::VectorizedFilter { column, op, value }
            }
            None => PhysicalOp::Filter {
                predicate: compile_expr(predicate),
            },
        },
        Stmt::Select { columns } => {
            if columns.is_empty() {
                return Err(CompileError::EmptyProjection);
            }
            PhysicalOp::Project {
                columns: columns.clone(),
            }
        }
        Stmt::Write { path } => PhysicalOp::Write { path: path.clone() },
    };
    Ok(op)
}

/// Lower an expression to stack bytecode by post-order emission: left
/// operand, right operand, then the operator opcode.
#[must_use]
pub fn compile_expr(expr: &Expr) -> IrExpr {
    let mut out = IrExpr::default();
    emit(expr, &mut out.instructions);
    out
}

fn emit(expr: &Expr, out: &mut Vec<Instr>) {
    match expr {
        Expr::Literal(literal) => out.push(match literal {
            Literal::Int(value) => Instr::PushInt(*value),
            Literal::Float(value) => Instr::PushFloat(*value),
            Literal::Str(value) => Instr::PushStr(value.clone()),
            Literal::Bool(value) => Instr::PushBool(*value),
        }),
        Expr::Column(name) => out.push(Instr::LoadColumn(name.clone())),
        Expr::Binary { op, left, right } => {
            emit(left, out);
            emit(right, out);
            out.push(match op {
                BinaryOp::Add => Instr::Add,
                BinaryOp::Sub => Instr::Sub,
                BinaryOp::Mul => Instr::Mul,
                BinaryOp::Div => Instr::Div,
                BinaryOp::Eq => Instr::Eq,
                BinaryOp::Neq => Instr::Neq,
                BinaryOp::Lt => Instr::Lt,
                BinaryOp::Gt => Instr::Gt,
                BinaryOp::Lte => Instr::Lte,
                BinaryOp::Gte => Instr::Gte,
            });
        }
        Expr::Unary { op, operand } => {
            emit(operand, out);
            out.push(match op {
                UnaryOp::Neg => Instr::Neg,
                UnaryOp::Not => Instr::Not,
            });
        }
    }
}

/// Recognize the narrow pattern a vectorized filter can run: a single
/// top-level comparison between a column reference and a non-boolean
/// literal, in either orientation. The `literal op column` form reflects
/// the operator so the canonical shape is always `column op scalar`.
/// Everything else falls through to the scalar interpreter.
fn detect_vectorized_filter(expr: &Expr) -> Option<(String, CmpOp, FilterScalar)> {
    let Expr::Binary { op, left, right } = expr else {
        return None;
    };
    let op = comparison_op(*op)?;

    match (left.as_ref(), right.as_ref()) {
        (Expr::Column(name), Expr::Literal(literal)) => {
            Some((name.clone(), op, filter_scalar(literal)?))
        }
        (Expr::Literal(literal), Expr::Column(name)) => {
            Some((name.clone(), op.reflect(), filter_scalar(literal)?))
        }
        _ => None,
    }
}

fn comparison_op(op: BinaryOp) -> Option<CmpOp> {
    match op {
        BinaryOp::Eq => Some(CmpOp::Eq),
        BinaryOp::Neq => Some(CmpOp::Neq),
        BinaryOp::Lt => Some(CmpOp::Lt),
        BinaryOp::Gt => Some(CmpOp::Gt),
        BinaryOp::Lte => Some(CmpOp::Lte),
        BinaryOp::Gte => Some(CmpOp::Gte),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => None,
    }
}

fn filter_scalar(literal: &Literal) -> Option<FilterScalar> {
    match literal {
        Literal::Int(value) => Some(FilterScalar::Int64(*value)),
        Literal::Float(value) => Some(FilterScalar::Float64(*value)),
        Literal::Str(value) => Some(FilterScalar::Utf8(value.clone())),
        Literal::Bool(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use rill_lang::{parse, tokenize, BinaryOp, Expr, Literal, Program, Stmt, UnaryOp};

    use super::{compile, compile_expr, CompileError};
    use crate::ir::{CmpOp, FilterScalar, Instr, PhysicalOp};

    fn plan_for(source: &str) -> Vec<PhysicalOp> {
        let program = parse(tokenize(source).expect("tokenize")).expect("parse");
        compile(&program).expect("compile").operators
    }

    #[test]
    fn statements_map_to_operators_in_order() {
        let operators =
            plan_for("from \"emp.csv\" filter age + 1 > 30 select name write \"out.csv\"");

        assert!(matches!(&operators[0], PhysicalOp::Scan { path } if path == "emp.csv"));
        assert!(matches!(&operators[1], PhysicalOp::Filter { .. }));
        assert!(matches!(&operators[2], PhysicalOp::Project { .. }));
        assert!(matches!(&operators[3], PhysicalOp::Write { path } if path == "out.csv"));
    }

    #[test]
    fn expression_lowering_is_post_order() {
        let expr = Expr::binary(
            BinaryOp::Gt,
            Expr::binary(
                BinaryOp::Add,
                Expr::column("age"),
                Expr::Literal(Literal::Int(5)),
            ),
            Expr::Literal(Literal::Int(40)),
        );

        assert_eq!(
            compile_expr(&expr).instructions,
            vec![
                Instr::LoadColumn("age".to_owned()),
                Instr::PushInt(5),
                Instr::Add,
                Instr::PushInt(40),
                Instr::Gt,
            ]
        );
    }

    #[test]
    fn unary_chains_emit_operand_then_operators() {
        let expr = Expr::unary(
            UnaryOp::Not,
            Expr::unary(UnaryOp::Neg, Expr::column("age")),
        );
        assert_eq!(
            compile_expr(&expr).instructions,
            vec![
                Instr::LoadColumn("age".to_owned()),
                Instr::Neg,
                Instr::Not,
            ]
        );
    }

    #[test]
    fn simple_comparison_against_literal_vectorizes() {
        let operators = plan_for("from \"t.csv\" filter age > 30");
        assert_eq!(
            operators[1],
            PhysicalOp::VectorizedFilter {
                column: "age".to_owned(),
                op: CmpOp::Gt,
                value: FilterScalar::Int64(30),
            }
        );
    }

    #[test]
    fn literal_on_the_left_reflects_the_operator() {
        let operators = plan_for("from \"t.csv\" filter 30 <= age");
        assert_eq!(
            operators[1],
            PhysicalOp::VectorizedFilter {
                column: "age".to_owned(),
                op: CmpOp::Gte,
                value: FilterScalar::Int64(30),
            }
        );

        let operators = plan_for("from \"t.csv\" filter \"B\" != name");
        assert_eq!(
            operators[1],
            PhysicalOp::VectorizedFilter {
                column: "name".to_owned(),
                op: CmpOp::Neq,
                value: FilterScalar::Utf8("B".to_owned()),
            }
        );
    }

    #[test]
    fn nested_and_arithmetic_filters_stay_scalar() {
        // Arithmetic on the column side defeats the pattern.
        let operators = plan_for("from \"t.csv\" filter age + 1 > 30");
        assert!(matches!(&operators[1], PhysicalOp::Filter { .. }));

        // So does a comparison of two columns.
        let operators = plan_for("from \"t.csv\" filter age > limit");
        assert!(matches!(&operators[1], PhysicalOp::Filter { .. }));

        // And a parenthesized-but-compound predicate.
        let operators = plan_for("from \"t.csv\" filter (age > 30) == (age < 50)");
        assert!(matches!(&operators[1], PhysicalOp::Filter { .. }));
    }

    #[test]
    fn boolean_literals_are_not_eligible_for_vectorization() {
        let program = Program {
            statements: vec![
                Stmt::From {
                    path: "t.csv".to_owned(),
                },
                Stmt::Filter {
                    predicate: Expr::binary(
                        BinaryOp::Eq,
                        Expr::column("flag"),
                        Expr::Literal(Literal::Bool(true)),
                    ),
                },
            ],
        };
        let plan = compile(&program).expect("compile");
        assert!(matches!(&plan.operators[1], PhysicalOp::Filter { .. }));
    }

    #[test]
    fn bool_literal_lowers_to_push_bool() {
        let expr = Expr::binary(
            BinaryOp::Eq,
            Expr::column("flag"),
            Expr::Literal(Literal::Bool(true)),
        );
        assert_eq!(
            compile_expr(&expr).instructions,
            vec![
                Instr::LoadColumn("flag".to_owned()),
                Instr::PushBool(true),
                Instr::Eq,
            ]
        );
    }

    #[test]
    fn program_handed_as_data_must_start_with_a_source() {
        let program = Program {
            statements: vec![Stmt::Write {
                path: "out.csv".to_owned(),
            }],
        };
        assert_eq!(
            compile(&program).expect_err("must fail"),
            CompileError::MissingSource
        );
    }

    #[test]
    fn empty_projection_is_rejected() {
        let program = Program {
            statements: vec![
                Stmt::From {
                    path: "t.csv".to_owned(),
                },
                Stmt::Select {
                    columns: Vec::new(),
                },
            ],
        };
        assert_eq!(
            compile(&program).expect_err("must fail"),
            CompileError::EmptyProjection
        );
    }
}
