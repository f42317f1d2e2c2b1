use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;

use super::{ANA, BO, Harness, Reply, StubScorer, scored};
use knapsack_domain::{CandidateState, ConfidenceLevel};
use knapsack_service::{CandidateOrder, Error};

fn single(resource_id: &str, score: u8, confidence: ConfidenceLevel) -> Reply {
	Reply::Candidates(vec![scored(&[resource_id], score, confidence)])
}

fn harness() -> Harness {
	Harness::new(StubScorer::new(Reply::Candidates(Vec::new())))
}

#[tokio::test]
async fn first_read_computes_and_persists() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;
	let coat = h.resource(BO, "Winter coat", "warm coat, size M", true).await;
	let _lamp = h.resource(BO, "Lamp", "desk lamp", true).await;

	h.scorer.set_reply(single(&coat.id, 90, ConfidenceLevel::High));

	let views = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to compute candidates.");

	assert_eq!(views.len(), 1);
	assert_eq!(views[0].resource_id, coat.id);
	assert_eq!(views[0].resource_name.as_deref(), Some("Winter coat"));
	assert_eq!(views[0].match_statistics.score, 90);
	assert_eq!(views[0].match_statistics.confidence_level, ConfidenceLevel::High);
	assert!((views[0].match_statistics.confidence - 0.9).abs() < f32::EPSILON);
	assert!(!views[0].selected);

	let again = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to read candidates.");

	assert_eq!(again, views, "Second read serves the stored list.");
	assert_eq!(h.scorer.calls(), 1);
	assert!(matches!(
		h.service.candidate_status(&need.id, ANA).await,
		Ok(CandidateState::Ready { candidate_count: 1, .. })
	));
}

#[tokio::test]
async fn scorer_timeout_leaves_need_uncomputed() {
	let h = Harness::new(StubScorer::new(Reply::Timeout));
	let need = h.need(ANA, "need a winter coat").await;
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;
	let err = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect_err("Expected the scorer to be unavailable.");

	assert!(matches!(err, Error::ScorerUnavailable { .. }));
	assert!(h.service.list_for_need(&need.id).await.expect("List failed.").is_empty());
	assert_eq!(
		h.service.candidate_status(&need.id, ANA).await.expect("Status failed."),
		CandidateState::Uncomputed
	);

	h.scorer.set_reply(single(&coat.id, 70, ConfidenceLevel::Medium));

	let views = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("The next read retries the run.");

	assert_eq!(views.len(), 1);
	assert_eq!(h.scorer.calls(), 2);
}

#[tokio::test]
async fn hallucinated_resources_are_dropped() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;
	let _coat = h.resource(BO, "Winter coat", "warm coat", true).await;

	h.scorer.set_reply(single("r999", 95, ConfidenceLevel::High));

	let views = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to compute candidates.");

	assert!(views.is_empty());
	assert!(matches!(
		h.service.candidate_status(&need.id, ANA).await,
		Ok(CandidateState::Ready { candidate_count: 0, .. })
	));
	assert_eq!(h.store.run_count(&need.id), 1);
}

#[tokio::test]
async fn malformed_answer_persists_nothing() {
	let h = Harness::new(StubScorer::new(Reply::Malformed));
	let need = h.need(ANA, "need a winter coat").await;
	let _coat = h.resource(BO, "Winter coat", "warm coat", true).await;
	let err = h
		.service
		.refresh_candidates(&need.id, ANA)
		.await
		.expect_err("Expected a malformed response error.");

	assert!(matches!(err, Error::MalformedScorerResponse { .. }));
	assert_eq!(h.store.run_count(&need.id), 0);
}

#[tokio::test]
async fn partial_write_rolls_back() {
	let h = harness();
	let need = h.need(ANA, "need furniture").await;
	let mut answer = Vec::new();

	for index in 0..5 {
		let chair = h.resource(BO, &format!("Chair {index}"), "wooden chair", true).await;

		answer.push(scored(&[chair.id.as_str()], 80 - index, ConfidenceLevel::Medium));
	}

	h.scorer.set_reply(Reply::Candidates(answer));
	h.store.fail_next_run_after(2);

	let err = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect_err("Expected the write to fail.");

	assert!(matches!(err, Error::Storage { .. }));
	assert!(h.service.list_for_need(&need.id).await.expect("List failed.").is_empty());
	assert_eq!(
		h.service.candidate_status(&need.id, ANA).await.expect("Status failed."),
		CandidateState::Uncomputed
	);
}

#[tokio::test]
async fn refresh_appends_a_run_and_selection_sticks() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;
	let scarf = h.resource(BO, "Scarf", "wool scarf", true).await;

	h.scorer.set_reply(Reply::Candidates(vec![
		scored(&[coat.id.as_str()], 60, ConfidenceLevel::Medium),
		scored(&[scarf.id.as_str()], 40, ConfidenceLevel::Low),
	]));

	let first = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to compute candidates.");

	tokio::time::sleep(Duration::from_millis(2)).await;
	h.scorer.set_reply(single(&coat.id, 85, ConfidenceLevel::High));

	let refreshed =
		h.service.refresh_candidates(&need.id, ANA).await.expect("Failed to refresh candidates.");

	assert_eq!(refreshed.len(), 1);
	assert_eq!(h.store.run_count(&need.id), 2);

	let all = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to read candidates.");

	assert_eq!(all.len(), 3);
	assert_eq!(all[0].id, refreshed[0].id, "Newest run comes first.");
	assert_eq!(all[1].id, first[0].id);
	assert_eq!(all[2].id, first[1].id);

	let by_score = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Score)
		.await
		.expect("Failed to read candidates.");

	assert_eq!(
		by_score.iter().map(|view| view.match_statistics.score).collect::<Vec<_>>(),
		vec![85, 60, 40]
	);

	for view in [&first[0], &first[1]] {
		let selected =
			h.service.select_candidate(&view.id, ANA).await.expect("Failed to select candidate.");

		assert!(selected.selected);
	}

	let stored = h.service.list_for_need(&need.id).await.expect("List failed.");

	assert_eq!(stored.iter().filter(|candidate| candidate.selected).count(), 2);
	assert!(matches!(
		h.service.select_candidate("missing", ANA).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn only_owner_reads_candidates() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;

	assert!(matches!(
		h.service.get_candidates(&need.id, BO, CandidateOrder::Recency).await,
		Err(Error::Forbidden { .. })
	));
	assert!(matches!(
		h.service.candidate_status(&need.id, BO).await,
		Err(Error::Forbidden { .. })
	));
	assert!(matches!(
		h.service.get_candidates("missing", ANA, CandidateOrder::Recency).await,
		Err(Error::NotFound { .. })
	));
	assert_eq!(h.scorer.calls(), 0);
}

#[tokio::test]
async fn pool_holds_public_and_own_private_resources() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;
	let public = h.resource(BO, "Coat", "public coat", true).await;
	let foreign_private = h.resource(BO, "Hidden coat", "private coat", false).await;
	let own_private = h.resource(ANA, "My coat", "my own coat", false).await;

	h.service.refresh_candidates(&need.id, ANA).await.expect("Failed to run match.");

	let pool = h.scorer.last_pool();

	assert!(pool.contains(&public.id));
	assert!(pool.contains(&own_private.id));
	assert!(!pool.contains(&foreign_private.id));
}

#[tokio::test]
async fn empty_pool_records_empty_run_without_scoring() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;
	let views = h
		.service
		.get_candidates(&need.id, ANA, CandidateOrder::Recency)
		.await
		.expect("Failed to compute candidates.");

	assert!(views.is_empty());
	assert_eq!(h.scorer.calls(), 0);
	assert!(matches!(
		h.service.candidate_status(&need.id, ANA).await,
		Ok(CandidateState::Ready { candidate_count: 0, .. })
	));
}

#[tokio::test]
async fn status_reports_computing_during_a_run() {
	let gate = Arc::new(Notify::new());
	let h = Harness::new(StubScorer::gated(Reply::Candidates(Vec::new()), gate.clone()));
	let need = h.need(ANA, "need a winter coat").await;
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;

	h.scorer.set_reply(single(&coat.id, 90, ConfidenceLevel::High));

	let service = h.service.clone();
	let need_id = need.id.clone();
	let task = tokio::spawn(async move {
		service.get_candidates(&need_id, ANA, CandidateOrder::Recency).await
	});
	let mut state = CandidateState::Uncomputed;

	for _ in 0..200 {
		state = h.service.candidate_status(&need.id, ANA).await.expect("Status failed.");

		if state == CandidateState::Computing {
			break;
		}

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	assert_eq!(state, CandidateState::Computing);

	gate.notify_one();

	let views = task.await.expect("Task panicked.").expect("Failed to compute candidates.");

	assert_eq!(views.len(), 1);
	assert!(matches!(
		h.service.candidate_status(&need.id, ANA).await,
		Ok(CandidateState::Ready { candidate_count: 1, .. })
	));
}

#[tokio::test]
async fn concurrent_first_reads_share_one_run() {
	let gate = Arc::new(Notify::new());
	let h = Harness::new(StubScorer::gated(Reply::Candidates(Vec::new()), gate.clone()));
	let need = h.need(ANA, "need a winter coat").await;
	let coat = h.resource(BO, "Winter coat", "warm coat", true).await;

	h.scorer.set_reply(single(&coat.id, 90, ConfidenceLevel::High));

	let readers = (0..4)
		.map(|_| {
			let service = h.service.clone();
			let need_id = need.id.clone();

			tokio::spawn(async move {
				service.get_candidates(&need_id, ANA, CandidateOrder::Recency).await
			})
		})
		.collect::<Vec<_>>();

	for _ in 0..200 {
		if h.scorer.calls() == 1 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	// Lets the other readers queue on the in-flight run.
	tokio::time::sleep(Duration::from_millis(20)).await;
	gate.notify_one();

	for reader in readers {
		let views = reader.await.expect("Task panicked.").expect("Failed to read candidates.");

		assert_eq!(views.len(), 1);
		assert_eq!(views[0].resource_id, coat.id);
	}

	assert_eq!(h.scorer.calls(), 1);
	assert_eq!(h.store.run_count(&need.id), 1);
}
