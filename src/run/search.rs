//! In-block point search over a block view's offset tables.

use std::cmp::Ordering;

use crate::run::block::BlockView;
use crate::run::KeyType;

/// Searches the error window `[max(0, p-e), min(N, p+e+1))` around a
/// predicted position. Linear comparison; ties resolve to the first
/// match. Windows are expected to be small.
pub fn window_search<'a>(
    view: &BlockView<'a>,
    key_type: KeyType,
    key: &[u8],
    predicted: usize,
    bound: usize,
) -> Option<(usize, &'a [u8])> {
    let lo = predicted.saturating_sub(bound);
    let hi = predicted.saturating_add(bound).saturating_add(1);
    linear_search(view, key_type, key, lo, hi)
}

/// Linear probe over `[lo, hi)`, clamped to the record count. Returns
/// the first index holding an equal key, with its value.
pub fn linear_search<'a>(
    view: &BlockView<'a>,
    key_type: KeyType,
    key: &[u8],
    lo: usize,
    hi: usize,
) -> Option<(usize, &'a [u8])> {
    let hi = hi.min(view.len());
    for i in lo..hi {
        if key_type.compare(view.key_bytes(i), key) == Ordering::Equal {
            return Some((i, view.value_bytes(i)));
        }
    }
    None
}

/// Lower-bound binary search over the whole block. Returns the first
/// index holding an equal key, with its value.
pub fn binary_search<'a>(
    view: &BlockView<'a>,
    key_type: KeyType,
    key: &[u8],
) -> Option<(usize, &'a [u8])> {
    let mut lo = 0;
    let mut hi = view.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if key_type.compare(view.key_bytes(mid), key) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    if lo < view.len() && key_type.compare(view.key_bytes(lo), key) == Ordering::Equal {
        return Some((lo, view.value_bytes(lo)));
    }
    None
}
