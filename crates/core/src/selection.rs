//! Turns a textual selection ("all", "1,3,5") into 0-based indices.

/// Resolve a user selection against `count` books.
///
/// `"all"` (any case) selects every index in order. Otherwise the input is a
/// comma-separated list of 1-based positions; tokens that are not integers or
/// fall outside `1..=count` are dropped. Order and duplicates are preserved.
pub fn resolve(input: &str, count: usize) -> Vec<usize> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return (0..count).collect();
    }

    input
        .split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .filter_map(|n| n.checked_sub(1).and_then(|idx| usize::try_from(idx).ok()))
        .filter(|&idx| idx < count)
        .collect()
}
