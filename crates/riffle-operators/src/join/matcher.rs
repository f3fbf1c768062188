//! Join-variant behaviour.
//!
//! The driver is agnostic to the join flavour: on matched groups it calls
//! `try_match` with one outer row and the inner-group cursor, and for outer
//! rows without a match it calls `on_miss_match`. Everything
//! variant-specific lives here, as a tagged enum over the fixed flavour set.

use riffle_core::chunk::Chunk;
use riffle_core::schema::{DataType, Field, Schema};
use riffle_core::types::Scalar;

use crate::filter::{eval_row, Predicate};
use crate::traits::OpError;

/// Resumable cursor over the rows of one inner key group.
///
/// `current` returns `None` once exhausted; `reach_end` lets semi variants
/// short-circuit the rest of the group.
pub trait GroupRows {
    fn current(&mut self) -> Result<Option<Vec<Scalar>>, OpError>;
    fn advance(&mut self) -> Result<(), OpError>;
    fn reach_end(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinVariant {
    Inner,
    LeftOuter,
    RightOuter,
    Semi,
    AntiSemi,
    /// Null-aware semi: emits the outer row plus a `matched` boolean that is
    /// NULL when only a NULL-valued residual was seen.
    LeftOuterSemi,
    AntiLeftOuterSemi,
}

impl JoinVariant {
    pub fn is_outer(self) -> bool {
        matches!(self, JoinVariant::LeftOuter | JoinVariant::RightOuter)
    }
}

pub struct Matcher {
    variant: JoinVariant,
    /// Physical output layout is left-child then right-child columns; this
    /// flag says the outer side is the right child.
    outer_is_right: bool,
    /// Residual predicates over the candidate row laid out as outer columns
    /// followed by inner columns.
    residual: Vec<Predicate>,
    inner_width: usize,
    schema: Schema,
}

impl Matcher {
    pub fn new(
        variant: JoinVariant,
        outer_schema: &Schema,
        inner_schema: &Schema,
        outer_is_right: bool,
        residual: Vec<Predicate>,
    ) -> Self {
        let schema = match variant {
            JoinVariant::Inner | JoinVariant::LeftOuter | JoinVariant::RightOuter => {
                let pad_inner = variant.is_outer();
                let inner_fields = Schema::new(
                    inner_schema
                        .fields
                        .iter()
                        .map(|f| Field::new(f.name.clone(), f.data_type, f.nullable || pad_inner))
                        .collect(),
                );
                if outer_is_right {
                    Schema::join(&inner_fields, outer_schema)
                } else {
                    Schema::join(outer_schema, &inner_fields)
                }
            }
            JoinVariant::Semi | JoinVariant::AntiSemi => outer_schema.clone(),
            JoinVariant::LeftOuterSemi | JoinVariant::AntiLeftOuterSemi => {
                let mut fields = outer_schema.fields.clone();
                fields.push(Field::new("matched", DataType::Boolean, true));
                Schema::new(fields)
            }
        };
        Self {
            variant,
            outer_is_right,
            residual,
            inner_width: inner_schema.len(),
            schema,
        }
    }

    /// Output column layout.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Advance `inners`, appending whatever the variant emits for rows whose
    /// residual predicate passes, until `out` is full or the group ends.
    /// Returns (any row matched, residual evaluated to NULL somewhere).
    pub fn try_match(
        &self,
        outer: &[Scalar],
        inners: &mut dyn GroupRows,
        out: &mut Chunk,
    ) -> Result<(bool, bool), OpError> {
        match self.variant {
            JoinVariant::Inner | JoinVariant::LeftOuter | JoinVariant::RightOuter => {
                self.match_joined(outer, inners, out)
            }
            JoinVariant::Semi
            | JoinVariant::AntiSemi
            | JoinVariant::LeftOuterSemi
            | JoinVariant::AntiLeftOuterSemi => self.match_semi(outer, inners, out),
        }
    }

    /// Append what the variant dictates for an outer row with no inner
    /// match: nothing (inner/semi), NULL padding (left/right outer), the
    /// outer row itself (anti-semi), or the outer row plus the match flag
    /// (null-aware variants).
    pub fn on_miss_match(
        &self,
        outer_had_null: bool,
        outer: &[Scalar],
        out: &mut Chunk,
    ) -> Result<(), OpError> {
        match self.variant {
            JoinVariant::Inner | JoinVariant::Semi => Ok(()),
            JoinVariant::LeftOuter | JoinVariant::RightOuter => {
                let nulls = vec![Scalar::Null; self.inner_width];
                let mut row = Vec::with_capacity(outer.len() + self.inner_width);
                if self.outer_is_right {
                    row.extend(nulls);
                    row.extend_from_slice(outer);
                } else {
                    row.extend_from_slice(outer);
                    row.extend(nulls);
                }
                out.append_row(&row)?;
                Ok(())
            }
            JoinVariant::AntiSemi => {
                // A NULL residual means "unknown match"; the anti join must
                // then suppress the row.
                if !outer_had_null {
                    out.append_row(outer)?;
                }
                Ok(())
            }
            JoinVariant::LeftOuterSemi => {
                self.append_with_flag(outer, flag_scalar(outer_had_null, false), out)
            }
            JoinVariant::AntiLeftOuterSemi => {
                self.append_with_flag(outer, flag_scalar(outer_had_null, true), out)
            }
        }
    }

    fn match_joined(
        &self,
        outer: &[Scalar],
        inners: &mut dyn GroupRows,
        out: &mut Chunk,
    ) -> Result<(bool, bool), OpError> {
        let mut matched = false;
        let mut has_null = false;
        while !out.is_full() {
            let Some(inner) = inners.current()? else {
                break;
            };
            let candidate = candidate_row(outer, &inner);
            match eval_row(&self.residual, &candidate)? {
                Some(true) => {
                    if self.outer_is_right {
                        let mut row = Vec::with_capacity(candidate.len());
                        row.extend_from_slice(&candidate[outer.len()..]);
                        row.extend_from_slice(&candidate[..outer.len()]);
                        out.append_row(&row)?;
                    } else {
                        out.append_row(&candidate)?;
                    }
                    matched = true;
                }
                Some(false) => {}
                None => has_null = true,
            }
            inners.advance()?;
        }
        Ok((matched, has_null))
    }

    fn match_semi(
        &self,
        outer: &[Scalar],
        inners: &mut dyn GroupRows,
        out: &mut Chunk,
    ) -> Result<(bool, bool), OpError> {
        let mut has_null = false;
        loop {
            let Some(inner) = inners.current()? else {
                break;
            };
            let candidate = candidate_row(outer, &inner);
            match eval_row(&self.residual, &candidate)? {
                Some(true) => {
                    match self.variant {
                        JoinVariant::Semi => out.append_row(outer)?,
                        JoinVariant::LeftOuterSemi => {
                            self.append_with_flag(outer, Scalar::Bool(true), out)?
                        }
                        JoinVariant::AntiLeftOuterSemi => {
                            self.append_with_flag(outer, Scalar::Bool(false), out)?
                        }
                        _ => {}
                    }
                    inners.reach_end();
                    return Ok((true, has_null));
                }
                Some(false) => {}
                None => has_null = true,
            }
            inners.advance()?;
        }
        Ok((false, has_null))
    }

    fn append_with_flag(
        &self,
        outer: &[Scalar],
        flag: Scalar,
        out: &mut Chunk,
    ) -> Result<(), OpError> {
        let mut row = Vec::with_capacity(outer.len() + 1);
        row.extend_from_slice(outer);
        row.push(flag);
        out.append_row(&row)?;
        Ok(())
    }
}

fn candidate_row(outer: &[Scalar], inner: &[Scalar]) -> Vec<Scalar> {
    let mut row = Vec::with_capacity(outer.len() + inner.len());
    row.extend_from_slice(outer);
    row.extend_from_slice(inner);
    row
}

fn flag_scalar(had_null: bool, on_plain_miss: bool) -> Scalar {
    if had_null {
        Scalar::Null
    } else {
        Scalar::Bool(on_plain_miss)
    }
}
