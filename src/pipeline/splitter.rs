/// Partition `items` into consecutive groups of at most `group_size`.
///
/// Order is preserved and the trailing partial group is kept. A list no
/// longer than `group_size` comes back as a single group; a `group_size` of
/// zero is treated as one.
pub fn split<T>(items: Vec<T>, group_size: usize) -> Vec<Vec<T>> {
    let size = group_size.max(1);
    if items.len() <= size {
        return vec![items];
    }

    let mut groups = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        groups.push(iter.by_ref().take(size).collect());
    }
    groups
}
