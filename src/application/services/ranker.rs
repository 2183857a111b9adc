//! Hybrid relevance scoring and grouped ranking.
//!
//! Each record is scored as
//!
//! ```text
//! total = cosine(query_embedding, record_embedding) + keyword_bonus
//! keyword_bonus = 0.3  if lowercase(query) is a substring of lowercase(question)
//!               = 0.2  else if edit_similarity(query, question) > 0.7
//!               = 0.0  otherwise
//! ```
//!
//! The blend is additive and unnormalised. The filtering threshold
//! (`min_score`, default 0.25) is tuned against these exact constants, so a
//! fuzzy-only match (0.2) never passes on its own while a literal substring
//! match (0.3) always does.
//!
//! Surviving records are merged by trimmed, case-sensitive question text,
//! ordered by their best score with a stable sort and cut to `top_k`.

use ahash::AHashMap;
use tracing::debug;

use crate::domain::{
    similarity::{cosine_similarity, edit_similarity},
    DomainError, QueryContext, RankingOptions, Record, RecordScore, ScoredGroup,
};

/// Bonus when the query appears verbatim (case-insensitive) in the question.
pub const SUBSTRING_BONUS: f32 = 0.3;

/// Bonus when the query is a near miss of the whole question.
pub const FUZZY_BONUS: f32 = 0.2;

/// Edit similarity must be strictly above this for [`FUZZY_BONUS`].
pub const FUZZY_THRESHOLD: f32 = 0.7;

/// Lexical component of a record's score.
pub fn keyword_score(query: &str, question: &str) -> f32 {
    keyword_score_lowered(&query.trim().to_lowercase(), question)
}

fn keyword_score_lowered(lowered_query: &str, question: &str) -> f32 {
    let lowered_question = question.to_lowercase();

    if lowered_question.contains(lowered_query) {
        SUBSTRING_BONUS
    } else if edit_similarity(lowered_query, &lowered_question) > FUZZY_THRESHOLD {
        FUZZY_BONUS
    } else {
        0.0
    }
}

/// Ranks Q&A records against a query. Pure; holds only its options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceRanker {
    options: RankingOptions,
}

impl RelevanceRanker {
    pub fn new(options: RankingOptions) -> Self {
        Self { options }
    }

    /// Score a single record. Fails only when the embeddings differ in length.
    pub fn score(&self, query: &QueryContext, record: &Record) -> Result<RecordScore, DomainError> {
        let lowered = query.text.trim().to_lowercase();
        score_prepared(&lowered, query.embedding.as_deref(), record)
    }

    /// Produce at most `top_k` groups, best first.
    ///
    /// Empty query text or an empty record set yields an empty list. A record
    /// whose embedding length differs from the query embedding rejects the
    /// whole call with [`DomainError::DimensionMismatch`].
    pub fn rank(
        &self,
        query: &QueryContext,
        records: &[Record],
    ) -> Result<Vec<ScoredGroup>, DomainError> {
        let lowered = query.text.trim().to_lowercase();
        if lowered.is_empty() || records.is_empty() || self.options.top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = query.embedding.as_deref();

        let mut slots: AHashMap<&str, usize> = AHashMap::new();
        let mut groups: Vec<ScoredGroup> = Vec::new();
        let mut survivors = 0usize;

        for record in records {
            let score = score_prepared(&lowered, embedding, record)?;
            if score.total < self.options.min_score {
                continue;
            }
            survivors += 1;

            let key = record.group_key();
            match slots.get(key) {
                Some(&slot) => {
                    let group = &mut groups[slot];
                    group.answers.push(record.answer.clone());
                    if score.total > group.score {
                        group.score = score.total;
                    }
                }
                None => {
                    slots.insert(key, groups.len());
                    groups.push(ScoredGroup {
                        question: key.to_string(),
                        answers: vec![record.answer.clone()],
                        score: score.total,
                    });
                }
            }
        }

        // `sort_by` is stable: equal scores keep first-appearance order.
        groups.sort_by(|a, b| b.score.total_cmp(&a.score));
        groups.truncate(self.options.top_k);

        debug!(
            target: "tanya::ranker",
            records = records.len(),
            survivors,
            groups = groups.len(),
            semantic = embedding.is_some(),
            "ranked records"
        );

        Ok(groups)
    }
}

/// Convenience wrapper over [`RelevanceRanker::rank`].
pub fn rank(
    query: &QueryContext,
    records: &[Record],
    options: RankingOptions,
) -> Result<Vec<ScoredGroup>, DomainError> {
    RelevanceRanker::new(options).rank(query, records)
}

fn score_prepared(
    lowered_query: &str,
    embedding: Option<&[f32]>,
    record: &Record,
) -> Result<RecordScore, DomainError> {
    let similarity = match embedding {
        Some(query_vector) => cosine_similarity(query_vector, &record.embedding)?,
        None => 0.0,
    };
    let keyword = keyword_score_lowered(lowered_query, &record.question);

    Ok(RecordScore {
        similarity,
        keyword,
        total: similarity + keyword,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_MIN_SCORE;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    fn ranker() -> RelevanceRanker {
        RelevanceRanker::default()
    }

    #[test]
    fn substring_match_scores_exactly_point_three() {
        assert_eq!(keyword_score("Refund", "What is your refund policy?"), SUBSTRING_BONUS);
        // substring wins even when the edit distance is large
        assert_eq!(
            keyword_score("a", "a very long question with little overlap"),
            SUBSTRING_BONUS
        );
    }

    #[test]
    fn near_miss_scores_fuzzy_bonus() {
        // one edit over 13 chars
        assert_eq!(keyword_score("refund policy", "refund polcy"), FUZZY_BONUS);
        assert_eq!(keyword_score("refund policy", "shipping times"), 0.0);
    }

    #[test]
    fn fuzzy_compares_question_untrimmed() {
        assert_eq!(keyword_score("refund polcy", "refund policy"), FUZZY_BONUS);
        // six padding spaces add six edits: 1 - 7/19 < 0.7
        assert_eq!(keyword_score("refund polcy", "   refund policy   "), 0.0);
        // substring containment is unaffected by padding
        assert_eq!(
            keyword_score("refund policy", "   refund policy   "),
            SUBSTRING_BONUS
        );
    }

    #[test]
    fn fuzzy_threshold_is_strict() {
        // "abcdefghij" vs "abcdefgxyz": 3 edits over 10 chars = 0.7 exactly
        assert_eq!(keyword_score("abcdefghij", "abcdefgxyz"), 0.0);
        // 2 edits over 10 chars = 0.8
        assert_eq!(keyword_score("abcdefghij", "abcdefghyz"), FUZZY_BONUS);
    }

    #[test]
    fn duplicate_questions_are_grouped() {
        let records = vec![
            Record::new("What is your refund policy?", "30 days", vec![1.0, 0.0]),
            Record::new(
                "What is your refund policy?",
                "Full refund within 30 days",
                vec![0.6, 0.8],
            ),
        ];
        let query = QueryContext::semantic("refund policy", vec![1.0, 0.0]);

        let groups = ranker().rank(&query, &records).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].question, "What is your refund policy?");
        assert_eq!(groups[0].answers, vec!["30 days", "Full refund within 30 days"]);
        // max(1.0 + 0.3, 0.6 + 0.3)
        assert!(approx(groups[0].score, 1.3));
    }

    #[test]
    fn group_score_is_max_even_when_best_answer_comes_later() {
        let records = vec![
            Record::new("Shipping?", "slow", vec![0.0, 1.0]),
            Record::new("Shipping?", "fast", vec![1.0, 0.0]),
        ];
        let query = QueryContext::semantic("shipping", vec![1.0, 0.0]);

        let groups = ranker().rank(&query, &records).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].answers, vec!["slow", "fast"]);
        assert!(approx(groups[0].score, 1.3));
    }

    #[test]
    fn grouping_trims_but_stays_case_sensitive() {
        let records = vec![
            Record::new("Refund?", "a", vec![1.0]),
            Record::new("  Refund?  ", "b", vec![1.0]),
            Record::new("refund?", "c", vec![1.0]),
        ];
        let query = QueryContext::lexical("refund");

        let groups = ranker().rank(&query, &records).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].question, "Refund?");
        assert_eq!(groups[0].answers, vec!["a", "b"]);
        assert_eq!(groups[1].question, "refund?");
        assert_eq!(groups[1].answers, vec!["c"]);
    }

    #[test]
    fn fuzzy_only_match_is_filtered_out() {
        let records = vec![Record::new("refund polcy", "see terms", vec![1.0, 0.0])];
        let query = QueryContext::lexical("refund policy");

        let score = ranker().score(&query, &records[0]).unwrap();
        assert!(approx(score.total, 0.2));
        assert!(score.total < DEFAULT_MIN_SCORE);

        let groups = ranker().rank(&query, &records).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn top_k_bounds_output_and_orders_descending() {
        let records: Vec<Record> = (0..15)
            .map(|i| {
                Record::new(
                    format!("question {i}"),
                    format!("answer {i}"),
                    vec![1.0, i as f32 * 0.1],
                )
            })
            .collect();
        let query = QueryContext::semantic("zzzz", vec![1.0, 0.0]);

        let groups = RelevanceRanker::new(RankingOptions::new(DEFAULT_MIN_SCORE, 10))
            .rank(&query, &records)
            .unwrap();

        assert_eq!(groups.len(), 10);
        assert_eq!(groups[0].question, "question 0");
        assert_eq!(groups[9].question, "question 9");
        for pair in groups.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let forward = vec![
            Record::new("refund a", "1", vec![1.0]),
            Record::new("refund b", "2", vec![1.0]),
        ];
        let query = QueryContext::lexical("refund");

        let groups = ranker().rank(&query, &forward).unwrap();
        let order: Vec<&str> = groups.iter().map(|g| g.question.as_str()).collect();
        assert_eq!(order, vec!["refund a", "refund b"]);

        let reversed: Vec<Record> = forward.into_iter().rev().collect();
        let groups = ranker().rank(&query, &reversed).unwrap();
        let order: Vec<&str> = groups.iter().map(|g| g.question.as_str()).collect();
        assert_eq!(order, vec!["refund b", "refund a"]);
    }

    #[test]
    fn degraded_mode_ranks_on_keywords_alone() {
        let records = vec![Record::new("refund policy", "see terms", vec![0.2, 0.4, 0.1])];
        let query = QueryContext::lexical("refund policy");

        let groups = ranker().rank(&query, &records).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].answers, vec!["see terms"]);
        assert!(approx(groups[0].score, 0.3));
    }

    #[test]
    fn semantic_match_outranks_keyword_match() {
        let records = vec![
            Record::new("shipping times", "3-5 days", vec![0.0, 1.0]),
            Record::new("refund policy", "see terms", vec![1.0, 0.0]),
        ];
        let query = QueryContext::semantic("shipping times", vec![1.0, 0.0]);

        let semantic = ranker().score(&query, &records[1]).unwrap();
        assert!(approx(semantic.similarity, 1.0));
        assert_eq!(semantic.keyword, 0.0);

        let groups = ranker().rank(&query, &records).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].question, "refund policy");
        assert!(approx(groups[0].score, 1.0));
        assert!(approx(groups[1].score, 0.3));
    }

    #[test]
    fn zero_query_vector_keeps_scores_finite() {
        let records = vec![Record::new("refund policy", "see terms", vec![1.0, 0.0])];
        let query = QueryContext::semantic("refund", vec![0.0, 0.0]);

        let groups = ranker().rank(&query, &records).unwrap();

        assert_eq!(groups.len(), 1);
        assert!(groups[0].score.is_finite());
        assert!(approx(groups[0].score, 0.3));
    }

    #[test]
    fn dimension_mismatch_rejects_the_call() {
        let records = vec![
            Record::new("refund policy", "see terms", vec![1.0, 0.0]),
            Record::new("shipping", "soon", vec![1.0, 0.0, 0.0]),
        ];
        let query = QueryContext::semantic("refund", vec![1.0, 0.0]);

        let err = ranker().rank(&query, &records).unwrap_err();
        assert!(matches!(
            err,
            DomainError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn empty_inputs_return_empty() {
        let records = vec![Record::new("refund policy", "see terms", vec![1.0])];

        assert!(ranker()
            .rank(&QueryContext::lexical("refund"), &[])
            .unwrap()
            .is_empty());
        assert!(ranker()
            .rank(&QueryContext::lexical("   "), &records)
            .unwrap()
            .is_empty());
        assert!(rank(
            &QueryContext::lexical("refund"),
            &records,
            RankingOptions::new(DEFAULT_MIN_SCORE, 0)
        )
        .unwrap()
        .is_empty());
    }

    #[test]
    fn ranking_is_deterministic() {
        let records = vec![
            Record::new("refund policy", "a", vec![0.9, 0.1]),
            Record::new("refund window", "b", vec![0.5, 0.5]),
            Record::new("refund policy", "c", vec![0.1, 0.9]),
        ];
        let query = QueryContext::semantic("refund", vec![1.0, 0.0]);

        let first = ranker().rank(&query, &records).unwrap();
        let second = ranker().rank(&query, &records).unwrap();
        assert_eq!(first, second);
    }
}
