use super::scorer::CompositeScore;
use std::cmp::Ordering;

/// A composite score with its 1-based position in the leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub rank: u32,
    pub score: CompositeScore,
}

/// Highest total first; equal totals fall back to the lower entity id.
fn leaderboard_order(a: &CompositeScore, b: &CompositeScore) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| a.entity_id.cmp(&b.entity_id))
}

/// Sorts, truncates to `top_n` and assigns dense ranks `1..=len`.
pub fn assemble(mut scores: Vec<CompositeScore>, top_n: usize) -> Vec<RankedEntry> {
    scores.sort_by(leaderboard_order);
    scores.truncate(top_n);
    scores
        .into_iter()
        .enumerate()
        .map(|(idx, score)| RankedEntry {
            rank: idx as u32 + 1,
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_store::EntityType;
    use std::collections::BTreeMap;

    fn score(entity_id: i64, total: f64) -> CompositeScore {
        CompositeScore {
            entity_id,
            entity_name: format!("Entity {}", entity_id),
            entity_type: EntityType::Artist,
            base_score: total,
            boost_score: 0.0,
            total_score: total,
            components: BTreeMap::new(),
        }
    }

    fn ids(entries: &[RankedEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.score.entity_id).collect()
    }

    #[test]
    fn test_sorted_descending_with_dense_ranks() {
        let ranked = assemble(
            vec![score(1, 5.0), score(2, 50.0), score(3, 0.0), score(4, 12.5)],
            500,
        );
        assert_eq!(ids(&ranked), vec![2, 4, 1, 3]);
        let ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let input = vec![score(9, 10.0), score(3, 10.0), score(7, 10.0), score(1, 2.0)];
        let first = assemble(input.clone(), 500);
        assert_eq!(ids(&first), vec![3, 7, 9, 1]);

        let mut reversed = input;
        reversed.reverse();
        assert_eq!(assemble(reversed, 500), first);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let input: Vec<CompositeScore> = (1..=600).map(|id| score(id, id as f64)).collect();
        let ranked = assemble(input, 500);
        assert_eq!(ranked.len(), 500);
        assert_eq!(ranked[0].score.entity_id, 600);
        assert_eq!(ranked[499].rank, 500);
        assert_eq!(ranked[499].score.entity_id, 101);
    }

    #[test]
    fn test_zero_score_ranks_last() {
        let ranked = assemble(vec![score(1, 0.0), score(2, 0.1)], 500);
        assert_eq!(ids(&ranked), vec![2, 1]);
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(Vec::new(), 500).is_empty());
    }
}
