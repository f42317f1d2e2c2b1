use std::collections::HashMap;

use super::{ANA, BO, Harness, Reply, StubScorer, new_item, scored, test_config};
use knapsack_domain::{ConfidenceLevel, ItemKind};
use knapsack_service::{CandidateOrder, Error};

fn harness() -> Harness {
	Harness::new(StubScorer::new(Reply::Candidates(Vec::new())))
}

#[tokio::test]
async fn entries_are_recorded_independently() {
	let h = harness();
	let coat_need = h.need(ANA, "need a winter coat").await;
	let broken_need = h.need(ANA, "need a bicycle").await;
	let silent_need = h.need(ANA, "need a lamp").await;
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;

	h.scorer.set_batch(HashMap::from([
		(
			coat_need.id.clone(),
			Ok(vec![
				scored(&[coat.id.as_str()], 88, ConfidenceLevel::High),
				scored(&["r999"], 99, ConfidenceLevel::High),
			]),
		),
		(broken_need.id.clone(), Err("Scorer entry is not an array.".to_string())),
	]));

	let ids = vec![
		coat_need.id.clone(),
		broken_need.id.clone(),
		silent_need.id.clone(),
		"missing".to_string(),
		coat_need.id.clone(),
	];
	let report = h.service.match_batch(&ids, Some(ANA)).await.expect("Batch failed.");

	assert_eq!(h.scorer.batch_calls(), 1);
	assert_eq!(report.recorded.len(), 2);

	let coat_run = report
		.recorded
		.iter()
		.find(|entry| entry.need_id == coat_need.id)
		.expect("Coat need should be recorded.");

	assert_eq!(coat_run.candidate_count, 1);
	assert_eq!(coat_run.discarded, 1);

	let silent_run = report
		.recorded
		.iter()
		.find(|entry| entry.need_id == silent_need.id)
		.expect("A need absent from the answer still gets a run.");

	assert_eq!(silent_run.candidate_count, 0);

	let mut failed = report
		.failed
		.iter()
		.map(|entry| (entry.need_id.as_str(), entry.error_code.as_str()))
		.collect::<Vec<_>>();

	failed.sort();

	let mut expected =
		vec![(broken_need.id.as_str(), "MALFORMED_SCORER_RESPONSE"), ("missing", "NOT_FOUND")];

	expected.sort();

	assert_eq!(failed, expected);
	assert_eq!(h.store.run_count(&broken_need.id), 0);
	assert_eq!(h.store.run_count(&coat_need.id), 1);

	let views = h
		.service
		.get_candidates(&coat_need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to read candidates.");

	assert_eq!(views.len(), 1);
	assert_eq!(h.scorer.calls(), 0, "Batch results are served without another scorer call.");
}

#[tokio::test]
async fn scorer_failure_fails_the_whole_batch() {
	let h = harness();
	let first = h.need(ANA, "need a winter coat").await;
	let second = h.need(ANA, "need a lamp").await;
	let _coat = h.resource(BO, "Winter coat", "warm coat", true).await;
	let err = h
		.service
		.match_batch(&[first.id.clone(), second.id.clone()], Some(ANA))
		.await
		.expect_err("Expected the scorer to be unavailable.");

	assert!(matches!(err, Error::ScorerUnavailable { .. }));
	assert_eq!(h.store.run_count(&first.id), 0);
	assert_eq!(h.store.run_count(&second.id), 0);
}

#[tokio::test]
async fn batch_input_is_validated() {
	let mut cfg = test_config();

	cfg.matching.batch_max_needs = 2;

	let h = Harness::with_config(cfg, StubScorer::new(Reply::Candidates(Vec::new())));

	assert!(matches!(
		h.service.match_batch(&[" ".to_string()], Some(ANA)).await,
		Err(Error::Validation { .. })
	));

	let ids = ["a", "b", "c"].map(str::to_string);

	assert!(matches!(
		h.service.match_batch(&ids, Some(ANA)).await,
		Err(Error::Validation { .. })
	));

	let theirs = h.need(BO, "need a drill").await;
	let mine = h.need(ANA, "need a coat").await;

	assert!(matches!(
		h.service.match_batch(&[mine.id, theirs.id], Some(ANA)).await,
		Err(Error::Forbidden { .. })
	));
	assert_eq!(h.scorer.batch_calls(), 0);
}

#[tokio::test]
async fn unmatched_public_needs_are_swept_once() {
	let h = harness();
	let open = h.need(ANA, "need a winter coat").await;
	let other = h.need(BO, "need a drill").await;
	let hidden = h
		.service
		.create_item(ItemKind::Need, new_item("need", "private need", false), Some(ANA))
		.await
		.expect("Failed to create need.");
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;
	let private = h.resource(ANA, "Spare coat", "private coat", false).await;

	h.scorer.set_batch(HashMap::from([(
		open.id.clone(),
		Ok(vec![scored(&[coat.id.as_str()], 75, ConfidenceLevel::Medium)]),
	)]));

	let report = h.service.match_unmatched(10).await.expect("Sweep failed.");

	assert_eq!(report.recorded.len(), 2);
	assert!(report.failed.is_empty());
	assert_eq!(h.store.run_count(&open.id), 1);
	assert_eq!(h.store.run_count(&other.id), 1);
	assert_eq!(h.store.run_count(&hidden.id), 0);
	assert!(!h.scorer.last_pool().contains(&private.id), "Sweeps only see public resources.");

	let again = h.service.match_unmatched(10).await.expect("Sweep failed.");

	assert!(again.recorded.is_empty());
	assert_eq!(h.scorer.batch_calls(), 1);
}

#[tokio::test]
async fn failed_write_does_not_block_other_needs() {
	let h = harness();
	let coat_need = h.need(ANA, "need a winter coat").await;
	let lamp_need = h.need(ANA, "need a lamp").await;
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;
	let lamp = h.resource(BO, "Lamp", "desk lamp", true).await;

	h.scorer.set_batch(HashMap::from([
		(coat_need.id.clone(), Ok(vec![scored(&[coat.id.as_str()], 88, ConfidenceLevel::High)])),
		(lamp_need.id.clone(), Ok(vec![scored(&[lamp.id.as_str()], 70, ConfidenceLevel::Medium)])),
	]));
	h.store.fail_next_run_after(0);

	let ids = vec![coat_need.id.clone(), lamp_need.id.clone()];
	let report = h.service.match_batch(&ids, Some(ANA)).await.expect("Batch failed.");

	assert_eq!(report.recorded.len(), 1);
	assert_eq!(report.failed.len(), 1);
	assert_eq!(report.failed[0].error_code, "STORAGE_ERROR");

	let failed_id = report.failed[0].need_id.clone();
	let recorded_id = report.recorded[0].need_id.clone();

	assert_ne!(failed_id, recorded_id);
	assert_eq!(h.store.run_count(&failed_id), 0);
	assert_eq!(h.store.run_count(&recorded_id), 1);
	assert_eq!(report.recorded[0].candidate_count, 1);
}
