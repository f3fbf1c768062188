//! Vectorised filter service.
//!
//! Predicates compare a column against a literal or another column. The
//! vectorised entry point produces one boolean per physical row (NULL counts
//! as not passing, the SQL WHERE convention); the row-wise entry point keeps
//! the three-valued result because residual join predicates must distinguish
//! NULL from false.

use riffle_core::chunk::Chunk;
use riffle_core::schema::{DataType, Schema};
use riffle_core::types::Scalar;

use crate::compare::compare_scalars;
use crate::traits::OpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, cmp: i8) -> bool {
        match self {
            CmpOp::Eq => cmp == 0,
            CmpOp::Ne => cmp != 0,
            CmpOp::Lt => cmp < 0,
            CmpOp::Le => cmp <= 0,
            CmpOp::Gt => cmp > 0,
            CmpOp::Ge => cmp >= 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Operand {
    Col(usize),
    Lit(Scalar),
}

/// One comparison predicate: `column OP operand`.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub col: usize,
    pub op: CmpOp,
    pub rhs: Operand,
}

impl Predicate {
    /// Parse a predicate of the form "column OP literal" or
    /// "column OP column" against `schema`. Literals are typed after the
    /// left-hand column.
    pub fn parse(expr: &str, schema: &Schema) -> Result<Self, OpError> {
        const OPS: [(&str, CmpOp); 6] = [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ];

        for (text, op) in OPS {
            if let Some(pos) = expr.find(text) {
                let lhs = expr[..pos].trim();
                let rhs = expr[pos + text.len()..].trim();

                let col = schema
                    .index_of(lhs)
                    .ok_or_else(|| OpError::Plan(format!("filter column '{lhs}' not found")))?;

                let rhs = match schema.index_of(rhs) {
                    Some(idx) => Operand::Col(idx),
                    None => {
                        let dt = schema.fields[col].data_type;
                        Operand::Lit(parse_literal(rhs, dt)?)
                    }
                };
                return Ok(Predicate { col, op, rhs });
            }
        }

        Err(OpError::Plan(format!("unparseable predicate: {expr}")))
    }

    /// Three-valued evaluation against a materialised row.
    pub fn eval(&self, row: &[Scalar]) -> Result<Option<bool>, OpError> {
        let lhs = &row[self.col];
        let rhs = match &self.rhs {
            Operand::Col(idx) => &row[*idx],
            Operand::Lit(v) => v,
        };
        tri_state(lhs, rhs, self.op)
    }

    fn eval_at(&self, chunk: &Chunk, phys_row: usize) -> Result<Option<bool>, OpError> {
        let lhs = chunk.get(phys_row, self.col);
        let rhs = match &self.rhs {
            Operand::Col(idx) => chunk.get(phys_row, *idx),
            Operand::Lit(v) => v,
        };
        tri_state(lhs, rhs, self.op)
    }
}

fn tri_state(lhs: &Scalar, rhs: &Scalar, op: CmpOp) -> Result<Option<bool>, OpError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(None);
    }
    let (cmp, _) = compare_scalars(lhs, rhs)?;
    Ok(Some(op.holds(cmp)))
}

fn parse_literal(text: &str, dt: DataType) -> Result<Scalar, OpError> {
    let err = |e: String| OpError::Plan(format!("cannot parse literal '{text}': {e}"));
    Ok(match dt {
        DataType::Boolean => Scalar::Bool(text.parse().map_err(|e| err(format!("{e}")))?),
        DataType::Int32 => Scalar::I32(text.parse().map_err(|e| err(format!("{e}")))?),
        DataType::Int64 => Scalar::I64(text.parse().map_err(|e| err(format!("{e}")))?),
        DataType::Float32 => Scalar::F32(text.parse().map_err(|e| err(format!("{e}")))?),
        DataType::Float64 => Scalar::F64(text.parse().map_err(|e| err(format!("{e}")))?),
        DataType::Utf8 => Scalar::Str(text.to_string()),
        DataType::Binary => return Err(OpError::Plan("binary literals are unsupported".into())),
    })
}

/// Evaluate the conjunction of `preds` for every physical row of `chunk`,
/// writing one boolean per row into `mask`. NULL results do not pass.
pub fn vectorized_filter(
    preds: &[Predicate],
    chunk: &Chunk,
    mask: &mut Vec<bool>,
) -> Result<(), OpError> {
    let n = chunk.phys_rows();
    mask.clear();
    mask.resize(n, true);
    for pred in preds {
        for (row, keep) in mask.iter_mut().enumerate() {
            if *keep {
                *keep = matches!(pred.eval_at(chunk, row)?, Some(true));
            }
        }
    }
    Ok(())
}

/// Three-valued conjunction over a materialised row: false dominates NULL.
pub fn eval_row(preds: &[Predicate], row: &[Scalar]) -> Result<Option<bool>, OpError> {
    let mut saw_null = false;
    for pred in preds {
        match pred.eval(row)? {
            Some(true) => {}
            Some(false) => return Ok(Some(false)),
            None => saw_null = true,
        }
    }
    if saw_null {
        Ok(None)
    } else {
        Ok(Some(true))
    }
}
