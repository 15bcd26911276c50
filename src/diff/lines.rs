use similar::{Algorithm, ChangeTag, TextDiff};
use tracing::debug;

use super::types::{DiffLine, LineKind};

/// Upper bound on LCS table cells (u32 each). Larger inputs are aligned with
/// Myers' algorithm in linear space instead.
const MAX_TABLE_CELLS: usize = 16 * 1024 * 1024;

/// Compute a line-level diff between `before` and `after`.
///
/// Lines keep their terminators, so concatenating removed + unchanged lines
/// rebuilds `before` exactly and added + unchanged rebuilds `after`.
///
/// Alignment is a longest common subsequence walked front to back, taking a
/// match as early as possible. Within each run of changed lines the removed
/// lines come first, then the added ones.
pub fn diff_lines(before: &str, after: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = before.split_inclusive('\n').collect();
    let new: Vec<&str> = after.split_inclusive('\n').collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let mut out: Vec<DiffLine> = old[..prefix].iter().map(|l| DiffLine::unchanged(l)).collect();

    let (old_rest, new_rest) = (&old[prefix..], &new[prefix..]);
    let middle = if fits_table(old_rest, new_rest) {
        align(old_rest, new_rest)
    } else {
        debug!(
            before_lines = old_rest.len(),
            after_lines = new_rest.len(),
            "large file, aligning with myers"
        );
        align_myers(old_rest, new_rest)
    };

    out.extend(group_changes(middle));
    out
}

fn fits_table(old: &[&str], new: &[&str]) -> bool {
    (old.len() + 1)
        .checked_mul(new.len() + 1)
        .is_some_and(|cells| cells <= MAX_TABLE_CELLS)
}

/// LCS alignment. `table[i][j]` holds the LCS length of `old[i..]` and
/// `new[j..]`, so a forward walk can take the earliest match.
fn align(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let (n, m) = (old.len(), new.len());
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            lines.push(DiffLine::unchanged(old[i]));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            lines.push(DiffLine::removed(old[i]));
            i += 1;
        } else {
            lines.push(DiffLine::added(new[j]));
            j += 1;
        }
    }
    lines.extend(old[i..].iter().map(|l| DiffLine::removed(l)));
    lines.extend(new[j..].iter().map(|l| DiffLine::added(l)));
    lines
}

/// Minimal alignment in linear space. Ties are not guaranteed to favor the
/// earliest match the way `align` does.
fn align_myers(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(old, new)
        .iter_all_changes()
        .map(|change| match change.tag() {
            ChangeTag::Equal => DiffLine::unchanged(change.value()),
            ChangeTag::Delete => DiffLine::removed(change.value()),
            ChangeTag::Insert => DiffLine::added(change.value()),
        })
        .collect()
}

/// Reorder each run of changed lines to removed-then-added. Relative order
/// within each kind is kept, so both sides still rebuild exactly.
fn group_changes(lines: Vec<DiffLine>) -> Vec<DiffLine> {
    let mut out = Vec::with_capacity(lines.len());
    let mut added = Vec::new();
    for line in lines {
        match line.kind {
            LineKind::Removed => out.push(line),
            LineKind::Added => added.push(line),
            LineKind::Unchanged => {
                out.append(&mut added);
                out.push(line);
            }
        }
    }
    out.append(&mut added);
    out
}
