//! Comparator service for join keys.
//!
//! A `CompareFunc` is resolved once per key-column pair from the declared
//! column types; at run time it returns the ordering plus a flag telling
//! whether either operand was NULL. NULL sorts before every value and two
//! NULLs compare equal, for both sort directions; direction handling is the
//! join driver's job.

use std::cmp::Ordering;

use riffle_core::schema::DataType;
use riffle_core::types::Scalar;

use crate::traits::OpError;

/// Returns (-1 | 0 | +1, either-side-NULL flag).
pub type CompareFunc = fn(&Scalar, &Scalar) -> Result<(i8, bool), OpError>;

/// Resolve the comparator for a key-column pair. Both sides must declare the
/// same type; anything else is rejected up front (the planner should not
/// have chosen a merge join for such a shape).
pub fn compare_func_for(lhs: &DataType, rhs: &DataType) -> Result<CompareFunc, OpError> {
    if lhs != rhs {
        return Err(OpError::Schema(format!(
            "merge join key types disagree: {:?} vs {:?}",
            lhs, rhs
        )));
    }
    Ok(match lhs {
        DataType::Boolean => cmp_bool,
        DataType::Int32 => cmp_i32,
        DataType::Int64 => cmp_i64,
        DataType::Float32 => cmp_f32,
        DataType::Float64 => cmp_f64,
        DataType::Utf8 => cmp_str,
        DataType::Binary => cmp_bin,
    })
}

/// Lexicographic comparison of two rows over their key columns.
pub fn compare_keys(
    funcs: &[CompareFunc],
    a_keys: &[usize],
    b_keys: &[usize],
    a: &[Scalar],
    b: &[Scalar],
) -> Result<i8, OpError> {
    for ((f, &ai), &bi) in funcs.iter().zip(a_keys).zip(b_keys) {
        let (cmp, _) = f(&a[ai], &b[bi])?;
        if cmp != 0 {
            return Ok(cmp);
        }
    }
    Ok(0)
}

/// Generic scalar comparison used by the filter service. Values must share a
/// type; NULL sorts first and two NULLs compare equal.
pub fn compare_scalars(a: &Scalar, b: &Scalar) -> Result<(i8, bool), OpError> {
    use Scalar::*;
    match (a, b) {
        (Null, Null) => Ok((0, true)),
        (Null, _) => Ok((-1, true)),
        (_, Null) => Ok((1, true)),
        (Bool(x), Bool(y)) => Ok((ord(x.cmp(y)), false)),
        (I32(x), I32(y)) => Ok((ord(x.cmp(y)), false)),
        (I64(x), I64(y)) => Ok((ord(x.cmp(y)), false)),
        (F32(x), F32(y)) => Ok((ord(total_f64(*x as f64, *y as f64)), false)),
        (F64(x), F64(y)) => Ok((ord(total_f64(*x, *y)), false)),
        (Str(x), Str(y)) => Ok((ord(x.cmp(y)), false)),
        (Bin(x), Bin(y)) => Ok((ord(x.cmp(y)), false)),
        _ => Err(OpError::Exec(format!(
            "cannot compare values of different types: {:?} vs {:?}",
            a, b
        ))),
    }
}

fn ord(o: Ordering) -> i8 {
    match o {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Total order for floats: NaN compares greater than every number and equal
/// to itself, so sorted inputs stay well defined.
fn total_f64(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

macro_rules! typed_cmp {
    ($name:ident, $variant:ident, $ty_name:literal) => {
        fn $name(a: &Scalar, b: &Scalar) -> Result<(i8, bool), OpError> {
            match (a, b) {
                (Scalar::Null, _) | (_, Scalar::Null) => compare_scalars(a, b),
                (Scalar::$variant(_), Scalar::$variant(_)) => compare_scalars(a, b),
                _ => Err(OpError::Exec(format!(
                    concat!("comparator expected ", $ty_name, " key values, got {:?} vs {:?}"),
                    a, b
                ))),
            }
        }
    };
}

typed_cmp!(cmp_bool, Bool, "boolean");
typed_cmp!(cmp_i32, I32, "int32");
typed_cmp!(cmp_i64, I64, "int64");
typed_cmp!(cmp_f32, F32, "float32");
typed_cmp!(cmp_f64, F64, "float64");
typed_cmp!(cmp_str, Str, "utf8");
typed_cmp!(cmp_bin, Bin, "binary");
