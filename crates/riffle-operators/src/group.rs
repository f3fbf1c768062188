//! Group checker: partitions consecutive rows into runs of equal join key.
//!
//! Stateful across successive chunks: the key of the last row it saw is
//! remembered so `split` can report whether a new chunk's first row continues
//! the previous chunk's final group (the carry flag). This is the only place
//! key equality between a side's own rows is computed; comparison between the
//! two join sides happens in the driver.
//!
//! Because inputs are declared sorted, an adjacent-row comparison in the
//! wrong direction means the upstream violated its contract and splitting
//! fails with an invariant error.

use riffle_core::chunk::Chunk;
use riffle_core::types::Scalar;

use crate::compare::CompareFunc;
use crate::traits::OpError;

pub struct GroupChecker {
    key_cols: Vec<usize>,
    cmp_funcs: Vec<CompareFunc>,
    desc: bool,
    /// Key of the last row emitted by the previous `split`.
    last_key: Option<Vec<Scalar>>,
    bounds: Vec<(usize, usize)>,
    next_group: usize,
}

impl GroupChecker {
    pub fn new(key_cols: Vec<usize>, cmp_funcs: Vec<CompareFunc>, desc: bool) -> Self {
        debug_assert_eq!(key_cols.len(), cmp_funcs.len());
        Self {
            key_cols,
            cmp_funcs,
            desc,
            last_key: None,
            bounds: Vec::new(),
            next_group: 0,
        }
    }

    /// Forget all recorded runs and the carried key (used on reopen).
    pub fn reset(&mut self) {
        self.last_key = None;
        self.bounds.clear();
        self.next_group = 0;
    }

    /// Scan `chunk`, record run boundaries, and return the carry flag: true
    /// iff the first row's key equals the previous chunk's last key.
    pub fn split(&mut self, chunk: &Chunk) -> Result<bool, OpError> {
        self.bounds.clear();
        self.next_group = 0;

        let n = chunk.phys_rows();
        if n == 0 {
            return Ok(false);
        }

        let first = self.key_of(chunk, 0);
        let carry = match self.last_key.take() {
            Some(prev) => {
                let cmp = self.cmp_key(&prev, &first)?;
                self.check_order(cmp)?;
                cmp == 0
            }
            None => false,
        };

        let mut begin = 0;
        let mut prev = first;
        for i in 1..n {
            let key = self.key_of(chunk, i);
            let cmp = self.cmp_key(&prev, &key)?;
            if cmp != 0 {
                self.check_order(cmp)?;
                self.bounds.push((begin, i));
                begin = i;
            }
            prev = key;
        }
        self.bounds.push((begin, n));
        self.last_key = Some(prev);

        Ok(carry)
    }

    /// Consume the next recorded run as a half-open physical row range.
    pub fn next_group(&mut self) -> Option<(usize, usize)> {
        let g = self.bounds.get(self.next_group).copied();
        if g.is_some() {
            self.next_group += 1;
        }
        g
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_group >= self.bounds.len()
    }

    fn key_of(&self, chunk: &Chunk, phys_row: usize) -> Vec<Scalar> {
        self.key_cols
            .iter()
            .map(|&c| chunk.get(phys_row, c).clone())
            .collect()
    }

    fn cmp_key(&self, a: &[Scalar], b: &[Scalar]) -> Result<i8, OpError> {
        for (f, (x, y)) in self.cmp_funcs.iter().zip(a.iter().zip(b)) {
            let (cmp, _) = f(x, y)?;
            if cmp != 0 {
                return Ok(cmp);
            }
        }
        Ok(0)
    }

    fn check_order(&self, cmp: i8) -> Result<(), OpError> {
        let violated = if self.desc { cmp < 0 } else { cmp > 0 };
        if violated {
            return Err(OpError::Invariant(format!(
                "input rows are not sorted {} on the join keys",
                if self.desc { "descending" } else { "ascending" }
            )));
        }
        Ok(())
    }
}
