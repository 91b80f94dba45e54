/// Count how many items of `wanted` also occur in `held`.
///
/// Both sides are sorted, then walked with two cursors: equal heads count and
/// advance together, otherwise the smaller head advances. Linear after the
/// sort and independent of the input order.
pub fn sorted_merge_count<T: Ord + Copy>(wanted: &[T], held: &[T]) -> usize {
    let mut a = wanted.to_vec();
    let mut b = held.to_vec();
    a.sort_unstable();
    b.sort_unstable();

    let (mut i, mut j, mut matched) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                matched += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Less => i += 1,
        }
    }
    matched
}
