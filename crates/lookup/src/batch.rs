use crate::KeySet;
use std::num::NonZeroUsize;
use std::slice::Chunks;

/// Split `keys` into batches of at most `size` keys, in key-set order.
///
/// Every key lands in exactly one batch; only the last batch may be smaller
/// than `size`. A key set no larger than `size` is a single batch, and an
/// empty key set yields no batches at all.
///
/// ```
/// use depinfo_lookup::{KeySet, batch};
/// use std::num::NonZeroUsize;
///
/// let keys: KeySet = (0..10).map(|n| n.to_string()).collect();
/// let sizes: Vec<usize> = batch(&keys, NonZeroUsize::new(3).unwrap()).map(<[_]>::len).collect();
/// assert_eq!(sizes, [3, 3, 3, 1]);
/// ```
pub fn batch(keys: &KeySet, size: NonZeroUsize) -> Chunks<'_, String> {
    keys.as_slice().chunks(size.get())
}
