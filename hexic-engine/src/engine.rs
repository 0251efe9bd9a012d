//! Inner-loop kernels shared by the operators.
//!
//! Every kernel is generic over a const row width and instantiated through
//! [`call_fixed_size!`], which picks the statically sized code path for
//! widths one through five and falls back to the dynamic width. Inside the
//! static instantiations `cols()` is a compile-time constant, so the row
//! chunking vectorizes.

use crate::error::Result;
use hexic_core::Id;
use hexic_table::{IdTable, IdTableStatic};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;

/// Dispatch `$func::<W>($args...)` on a runtime width: static widths 1–5,
/// dynamic fallback otherwise.
#[macro_export]
macro_rules! call_fixed_size {
    ($width:expr, $func:ident, $($arg:expr),* $(,)?) => {
        match $width {
            1 => $func::<1>($($arg),*),
            2 => $func::<2>($($arg),*),
            3 => $func::<3>($($arg),*),
            4 => $func::<4>($($arg),*),
            5 => $func::<5>($($arg),*),
            _ => $func::<0>($($arg),*),
        }
    };
}

/// Append every row of `input` satisfying `pred` to `out`. Input order is
/// preserved. `out` must have the input's width.
pub fn filter(input: &IdTable, pred: impl Fn(&[Id]) -> bool, out: &mut IdTable) -> Result<()> {
    debug_assert_eq!(input.cols(), out.cols());
    let owned = std::mem::take(out);
    let pred: &dyn Fn(&[Id]) -> bool = &pred;
    *out = call_fixed_size!(input.cols(), filter_width, input, pred, owned)?;
    Ok(())
}

fn filter_width<const W: usize>(
    input: &IdTable,
    pred: &dyn Fn(&[Id]) -> bool,
    out: IdTable,
) -> Result<IdTable> {
    let view = input.as_static_view::<W>();
    let mut res = out.move_to_static::<W>();
    for row in view.iter() {
        if pred(row) {
            res.push_row(row)?;
        }
    }
    Ok(res.move_to_dynamic())
}

/// Semi-join of `input` against a width-2 `mask`: keep the rows whose
/// `(jc1, jc2)` pair appears in the mask. Input order is preserved.
pub fn mask_filter(
    input: &IdTable,
    jc1: usize,
    jc2: usize,
    mask: &IdTable,
    out: &mut IdTable,
) -> Result<()> {
    debug_assert_eq!(mask.cols(), 2);
    debug_assert_eq!(input.cols(), out.cols());
    let pairs: FxHashSet<(Id, Id)> = mask.iter().map(|row| (row[0], row[1])).collect();
    let owned = std::mem::take(out);
    *out = call_fixed_size!(input.cols(), mask_filter_width, input, jc1, jc2, &pairs, owned)?;
    Ok(())
}

fn mask_filter_width<const W: usize>(
    input: &IdTable,
    jc1: usize,
    jc2: usize,
    pairs: &FxHashSet<(Id, Id)>,
    out: IdTable,
) -> Result<IdTable> {
    let view = input.as_static_view::<W>();
    let mut res = out.move_to_static::<W>();
    for row in view.iter() {
        if pairs.contains(&(row[jc1], row[jc2])) {
            res.push_row(row)?;
        }
    }
    Ok(res.move_to_dynamic())
}

/// Stable sort of the table's rows under `cmp`.
///
/// Implemented as a stable index sort followed by one permutation apply:
/// row contents move, never row handles, so ties keep their input order.
pub fn sort(table: &mut IdTable, cmp: impl Fn(&[Id], &[Id]) -> Ordering) -> Result<()> {
    let owned = std::mem::take(table);
    let cmp: &dyn Fn(&[Id], &[Id]) -> Ordering = &cmp;
    *table = call_fixed_size!(owned.cols(), sort_width, owned, cmp)?;
    Ok(())
}

fn sort_width<const W: usize>(
    table: IdTable,
    cmp: &dyn Fn(&[Id], &[Id]) -> Ordering,
) -> Result<IdTable> {
    let table = table.move_to_static::<W>();
    let mut order: Vec<u32> = (0..table.rows() as u32).collect();
    order.sort_by(|&a, &b| cmp(table.row(a as usize), table.row(b as usize)));

    let mut sorted = IdTableStatic::<W>::new(table.cols());
    sorted.reserve(table.rows())?;
    for &i in &order {
        sorted.push_row(table.row(i as usize))?;
    }
    Ok(sorted.move_to_dynamic())
}

/// First row index for which `below` is false; `below` must be monotone
/// over the table (true for a prefix of the rows).
pub fn lower_bound_row(table: &IdTable, below: impl Fn(&[Id]) -> bool) -> usize {
    let (mut lo, mut hi) = (0usize, table.rows());
    while lo < hi {
        let mid = (lo + hi) / 2;
        if below(table.row(mid)) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[[Id; 2]]) -> IdTable {
        let mut t = IdTable::new(2);
        for r in rows {
            t.push_row(r).unwrap();
        }
        t
    }

    #[test]
    fn test_filter_preserves_order() {
        let input = table(&[[1, 9], [2, 8], [3, 7], [4, 6]]);
        let mut out = IdTable::new(2);
        filter(&input, |row| row[0] % 2 == 0, &mut out).unwrap();
        assert_eq!(out.data(), &[2, 8, 4, 6]);
    }

    #[test]
    fn test_filter_dynamic_width_fallback() {
        // Width 6 exceeds the static instantiations.
        let mut input = IdTable::new(6);
        input.push_row(&[1, 2, 3, 4, 5, 6]).unwrap();
        input.push_row(&[2, 2, 3, 4, 5, 6]).unwrap();
        let mut out = IdTable::new(6);
        filter(&input, |row| row[0] == 2, &mut out).unwrap();
        assert_eq!(out.rows(), 1);
    }

    #[test]
    fn test_mask_filter() {
        let input = {
            let mut t = IdTable::new(3);
            for r in [[0, 1, 10], [0, 2, 21], [0, 3, 30]] {
                t.push_row(&r).unwrap();
            }
            t
        };
        let mask = table(&[[1, 10], [2, 20], [3, 30]]);
        let mut out = IdTable::new(3);
        mask_filter(&input, 1, 2, &mask, &mut out).unwrap();
        assert_eq!(out.data(), &[0, 1, 10, 0, 3, 30]);
    }

    #[test]
    fn test_sort_is_stable() {
        // Two rows tie on column 0; their input order must survive.
        let mut t = table(&[[2, 1], [1, 5], [2, 0], [1, 3]]);
        sort(&mut t, |a, b| a[0].cmp(&b[0])).unwrap();
        assert_eq!(t.data(), &[1, 5, 1, 3, 2, 1, 2, 0]);
    }

    #[test]
    fn test_lower_bound_row() {
        let t = table(&[[1, 0], [2, 0], [2, 0], [4, 0]]);
        assert_eq!(lower_bound_row(&t, |r| r[0] < 2), 1);
        assert_eq!(lower_bound_row(&t, |r| r[0] < 3), 3);
        assert_eq!(lower_bound_row(&t, |r| r[0] < 9), 4);
        assert_eq!(lower_bound_row(&t, |r| r[0] < 0), 0);
    }
}
