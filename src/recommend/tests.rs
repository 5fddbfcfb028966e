use super::*;
use crate::arcs::ArcBuilder;
use crate::candidates::select_candidates;
use crate::test_support::{generated_corpus, report, scenario, seeded_store};

fn candidate(bg_number: BugId, tfidf: f64, embedding: f64, categoric: f64) -> ScoredCandidate {
    ScoredCandidate {
        report: report(bg_number, "P1", "C1", "dev-A"),
        signals: SignalScores {
            tfidf,
            embedding,
            categoric,
        },
    }
}

fn ranked_ids(recommendations: &[Recommendation]) -> Vec<BugId> {
    recommendations
        .iter()
        .map(|recommendation| recommendation.report.bg_number)
        .collect()
}

#[test]
fn equal_scores_are_ordered_by_ascending_id() {
    let candidates = vec![
        candidate(9, 0.2, 0.2, 0.5),
        candidate(3, 0.2, 0.2, 0.5),
        candidate(12, 0.9, 0.1, 0.5),
        candidate(5, 0.2, 0.2, 0.5),
    ];

    let ranked = rank_candidates(
        candidates,
        10,
        ScoringStrategy::CategoricTfidfWe,
        &ScoringConfig::default(),
    );
    assert_eq!(ranked_ids(&ranked), vec![12, 3, 5, 9]);
    assert_eq!(
        ranked.iter().map(|item| item.rank).collect::<Vec<usize>>(),
        vec![1, 2, 3, 4]
    );
}

#[test]
fn strategy_changes_which_signals_rank() {
    let candidates = || {
        vec![
            candidate(1, 0.9, 0.0, 0.5),
            candidate(2, 0.0, 0.9, 0.5),
        ]
    };
    let config = ScoringConfig::default();

    let lexical = rank_candidates(candidates(), 2, ScoringStrategy::CategoricTfidf, &config);
    let semantic = rank_candidates(candidates(), 2, ScoringStrategy::CategoricWe, &config);
    assert_eq!(ranked_ids(&lexical), vec![1, 2]);
    assert_eq!(ranked_ids(&semantic), vec![2, 1]);
    assert!((lexical[0].score - 1.4).abs() < 1e-12);
    assert!((lexical[1].score - 0.5).abs() < 1e-12);
}

#[test]
fn truncates_to_k() {
    let candidates = (1..=6)
        .map(|id| candidate(id, 0.1 * id as f64, 0.0, 0.0))
        .collect::<Vec<ScoredCandidate>>();
    let ranked = rank_candidates(
        candidates,
        2,
        ScoringStrategy::CategoricTfidf,
        &ScoringConfig::default(),
    );
    assert_eq!(ranked_ids(&ranked), vec![6, 5]);
}

#[test]
fn zero_k_yields_empty_list() {
    let (query, corpus) = scenario();
    let store = seeded_store(&corpus);
    let recommender = Recommender::live(&store, ScoringConfig::default());

    let ranked = recommender
        .get_recommendations(&query, 0, ScoringStrategy::CategoricTfidfWe)
        .expect("recommends");
    assert!(ranked.is_empty());
}

#[test]
fn scenario_returns_both_eligible_candidates() {
    let (query, corpus) = scenario();
    let store = seeded_store(&corpus);
    let recommender = Recommender::live(&store, ScoringConfig::default());

    let ranked = recommender
        .get_recommendations(&query, 2, ScoringStrategy::CategoricTfidfWe)
        .expect("recommends");
    let mut ids = ranked_ids(&ranked);
    ids.sort();
    assert_eq!(ids, vec![1, 4]);
    assert!(ranked[0].score >= ranked[1].score);
}

#[test]
fn length_is_min_of_k_and_eligible_with_non_increasing_scores() {
    let corpus = generated_corpus(80, 29);
    let store = seeded_store(&corpus);
    let recommender = Recommender::live(&store, ScoringConfig::default());

    for query in corpus.iter().step_by(5) {
        let eligible = select_candidates(query, &corpus).len();
        for k in [1, 3, 10, 200] {
            let ranked = recommender
                .get_recommendations(query, k, ScoringStrategy::CategoricTfidfWe)
                .expect("recommends");
            assert_eq!(ranked.len(), k.min(eligible), "query {}", query.bg_number);
            for pair in ranked.windows(2) {
                assert!(pair[0].score >= pair[1].score);
                if pair[0].score == pair[1].score {
                    assert!(pair[0].report.bg_number < pair[1].report.bg_number);
                }
            }
        }
    }
}

#[test]
fn precomputed_arcs_and_live_scoring_agree() {
    let corpus = generated_corpus(60, 3);
    let store = seeded_store(&corpus);
    let builder = ArcBuilder::new(&store);
    for query in &corpus {
        builder.run_for_query(query).expect("arc pass");
    }

    let precomputed = Recommender::precomputed(&store, ScoringConfig::default());
    let live = Recommender::live(&store, ScoringConfig::default());
    assert_eq!(precomputed.source_name(), "precomputed");
    assert_eq!(live.source_name(), "live");

    for query in &corpus {
        for strategy in ScoringStrategy::ALL {
            let from_arcs = precomputed
                .get_recommendations(query, 5, strategy)
                .expect("precomputed");
            let from_live = live.get_recommendations(query, 5, strategy).expect("live");
            assert_eq!(ranked_ids(&from_arcs), ranked_ids(&from_live));
            for (left, right) in from_arcs.iter().zip(&from_live) {
                assert!((left.score - right.score).abs() < 1e-12);
            }
        }
    }
}

#[test]
fn live_scoring_rejects_query_without_vectors() {
    let (mut query, corpus) = scenario();
    let store = seeded_store(&corpus);
    query.tfidf_vector = None;

    let error = Recommender::live(&store, ScoringConfig::default())
        .get_recommendations(&query, 3, ScoringStrategy::CategoricTfidf)
        .expect_err("query lacks vectors");
    assert!(matches!(
        error,
        RecommendError::MissingVector { bg_number: 100 }
    ));
}

#[test]
fn precomputed_source_skips_arcs_to_missing_reports() {
    let (query, corpus) = scenario();
    let store = seeded_store(&corpus);
    ArcBuilder::new(&store)
        .run_for_query(&query)
        .expect("arc pass");
    store
        .insert_arcs(
            query.bg_number,
            &[crate::model::SimilarityArc {
                from: query.bg_number,
                to: 4242,
                cos_similarity_tfidf: 1.0,
                cos_similarity_word_embeddings: 1.0,
                categoric_similarity: 1.0,
            }],
        )
        .expect("dangling arc");

    let resolved = PrecomputedArcs::new(&store)
        .resolve(&query)
        .expect("resolves");
    let mut ids = resolved
        .iter()
        .map(|candidate| candidate.report.bg_number)
        .collect::<Vec<BugId>>();
    ids.sort();
    assert_eq!(ids, vec![1, 4]);
}

#[test]
fn precomputed_source_rejects_query_the_arc_pass_never_saw() {
    let (query, corpus) = scenario();
    let store = seeded_store(&corpus);

    let error = Recommender::precomputed(&store, ScoringConfig::default())
        .get_recommendations(&query, 2, ScoringStrategy::CategoricTfidfWe)
        .expect_err("no arc pass yet");
    assert!(matches!(
        error,
        RecommendError::NotProcessed { bg_number: 100 }
    ));
}

#[test]
fn precomputed_source_returns_empty_for_processed_query_without_candidates() {
    let (_, corpus) = scenario();
    let store = seeded_store(&corpus);
    let lonely = crate::test_support::vectorized(
        crate::test_support::at(report(500, "P9", "C9", "dev-Z"), "2010-01-01", None),
        500,
    );
    ArcBuilder::new(&store)
        .run_for_query(&lonely)
        .expect("arc pass");

    let ranked = Recommender::precomputed(&store, ScoringConfig::default())
        .get_recommendations(&lonely, 5, ScoringStrategy::CategoricWe)
        .expect("processed query resolves");
    assert!(ranked.is_empty());
}

#[test]
fn reimported_target_outside_the_window_drops_from_both_sources() {
    let (query, corpus) = scenario();
    let store = seeded_store(&corpus);
    ArcBuilder::new(&store)
        .run_for_query(&query)
        .expect("arc pass");

    let mut moved = corpus
        .iter()
        .find(|value| value.bg_number == 4)
        .cloned()
        .expect("report 4 in scenario");
    moved.when_changed_to_resolved = Some(crate::test_support::ts("2009-12-01"));
    store
        .upsert_reports(&[crate::test_support::new_report(&moved)])
        .expect("re-import");

    for recommender in [
        Recommender::precomputed(&store, ScoringConfig::default()),
        Recommender::live(&store, ScoringConfig::default()),
    ] {
        let ranked = recommender
            .get_recommendations(&query, 5, ScoringStrategy::CategoricTfidfWe)
            .expect("recommends");
        assert_eq!(ranked_ids(&ranked), vec![1], "{}", recommender.source_name());
    }
}
