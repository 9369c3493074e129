// src/fusion.rs
// Reciprocal Rank Fusion over ranked candidate lists

use std::collections::HashMap;
use std::hash::Hash;

/// Fuse ranked lists with Reciprocal Rank Fusion.
///
/// Each item accumulates `1 / (k + rank + 1)` per list it appears in, with
/// 0-based ranks. Items are keyed by identity via `key`; the first occurrence
/// of an item wins ownership of its value. Output is sorted by fused score
/// descending, ties broken by first-seen order.
pub fn rrf<T, K, F>(lists: Vec<Vec<T>>, k: u32, key: F) -> Vec<(T, f32)>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let weighted = lists.into_iter().map(|list| (list, 1.0)).collect();
    rrf_weighted(weighted, k, key)
}

/// RRF with a per-list weight multiplying each list's rank contributions.
///
/// `rrf` is the special case where every weight is 1.0.
pub fn rrf_weighted<T, K, F>(lists: Vec<(Vec<T>, f32)>, k: u32, key: F) -> Vec<(T, f32)>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    // (first-seen order, item, accumulated score)
    let mut fused: Vec<(T, f32)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();

    for (list, weight) in lists {
        for (rank, item) in list.into_iter().enumerate() {
            let contribution = weight / (k as f32 + rank as f32 + 1.0);
            match index.get(&key(&item)) {
                Some(&i) => fused[i].1 += contribution,
                None => {
                    index.insert(key(&item), fused.len());
                    fused.push((item, contribution));
                }
            }
        }
    }

    // Stable sort keeps first-seen order among equal scores
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}
