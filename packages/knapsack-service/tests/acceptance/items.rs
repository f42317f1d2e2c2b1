use serde_json::json;

use super::{ANA, BO, Harness, Reply, StubScorer, new_item};
use knapsack_domain::{ItemKind, ItemPatch};
use knapsack_service::{Error, SearchRequest};

fn harness() -> Harness {
	Harness::new(StubScorer::new(Reply::Candidates(Vec::new())))
}

#[tokio::test]
async fn create_requires_name_and_stamps_requester() {
	let h = harness();
	let err = h
		.service
		.create_item(ItemKind::Need, new_item("  ", "coat", true), Some(ANA))
		.await
		.expect_err("Expected a validation error.");

	assert!(matches!(err, Error::Validation { field: Some(ref field), .. } if field == "$.name"));

	let created = h
		.service
		.create_item(ItemKind::Need, new_item("coat", "need a winter coat", true), Some(ANA))
		.await
		.expect("Failed to create need.");

	assert_eq!(created.owner.as_deref(), Some(ANA));
	assert_eq!(created.id.len(), 16);
	assert_eq!(created.created_at, created.updated_at);

	let mut foreign = new_item("coat", "someone else's", true);

	foreign.owner = Some(BO.to_string());

	let err = h
		.service
		.create_item(ItemKind::Need, foreign, Some(ANA))
		.await
		.expect_err("Expected a forbidden error.");

	assert!(matches!(err, Error::Forbidden { .. }));
}

#[tokio::test]
async fn owner_is_immutable_through_update() {
	let h = harness();
	let need = h.need(ANA, "need a winter coat").await;
	let patch = ItemPatch { owner: Some(BO.to_string()), ..Default::default() };
	let err = h
		.service
		.update_item(ItemKind::Need, &need.id, patch, Some(ANA))
		.await
		.expect_err("Expected an immutable field error.");

	assert!(matches!(err, Error::ImmutableField { ref field, .. } if field == "$.owner"));

	let patch = ItemPatch {
		owner: Some(ANA.to_string()),
		description: Some("need a warm winter coat".to_string()),
		..Default::default()
	};
	let updated = h
		.service
		.update_item(ItemKind::Need, &need.id, patch, Some(ANA))
		.await
		.expect("Repeating the stored owner is allowed.");

	assert_eq!(updated.owner.as_deref(), Some(ANA));
	assert_eq!(updated.description.as_deref(), Some("need a warm winter coat"));
	assert!(updated.updated_at >= need.updated_at);
}

#[tokio::test]
async fn owner_cannot_be_added_to_ownerless_item() {
	let h = harness();
	let orphan = h
		.service
		.create_item(ItemKind::Resource, new_item("chair", "wooden chair", true), None)
		.await
		.expect("Failed to create resource.");

	assert!(orphan.owner.is_none());

	let patch = ItemPatch { owner: Some(ANA.to_string()), ..Default::default() };
	let err = h
		.service
		.update_item(ItemKind::Resource, &orphan.id, patch.clone(), None)
		.await
		.expect_err("Expected an immutable field error.");

	assert!(matches!(err, Error::ImmutableField { .. }));

	let err = h
		.service
		.update_item(ItemKind::Resource, &orphan.id, patch, Some(ANA))
		.await
		.expect_err("Ownerless items cannot be claimed by a requester.");

	assert!(matches!(err, Error::Forbidden { .. }));
}

#[tokio::test]
async fn only_owner_mutates() {
	let h = harness();
	let coat = h.resource(ANA, "coat", "warm coat, size M", true).await;
	let patch = ItemPatch { name: Some("stolen".to_string()), ..Default::default() };

	assert!(matches!(
		h.service.update_item(ItemKind::Resource, &coat.id, patch, Some(BO)).await,
		Err(Error::Forbidden { .. })
	));
	assert!(matches!(
		h.service.delete_item(ItemKind::Resource, &coat.id, Some(BO)).await,
		Err(Error::Forbidden { .. })
	));
	assert!(matches!(
		h.service.update_item(ItemKind::Resource, &coat.id, ItemPatch::default(), Some(ANA)).await,
		Err(Error::Validation { .. })
	));

	h.service.delete_item(ItemKind::Resource, &coat.id, Some(ANA)).await.expect("Delete failed.");

	assert!(matches!(
		h.service.get_item(ItemKind::Resource, &coat.id, Some(ANA)).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn visibility_toggle_is_idempotent() {
	let h = harness();
	let coat = h.resource(ANA, "coat", "warm coat", false).await;

	for _ in 0..2 {
		let updated = h
			.service
			.set_visibility(ItemKind::Resource, &coat.id, true, Some(ANA))
			.await
			.expect("Visibility update failed.");

		assert!(updated.public);
	}

	assert!(matches!(
		h.service.set_visibility(ItemKind::Resource, "missing", true, None).await,
		Err(Error::NotFound { .. })
	));
	assert!(
		h.service.get_item(ItemKind::Resource, &coat.id, None).await.is_ok(),
		"Public items are readable anonymously."
	);
}

#[tokio::test]
async fn prefix_search_and_filters() {
	let h = harness();
	let mut attributes = serde_json::Map::new();

	attributes.insert("size".to_string(), json!("Medium"));

	let mut draft = new_item("Warm coat", "Available Monday", true);

	draft.attributes = attributes;

	let coat = h
		.service
		.create_item(ItemKind::Resource, draft, Some(ANA))
		.await
		.expect("Failed to create coat.");

	tokio::time::sleep(std::time::Duration::from_millis(2)).await;

	let private = h.resource(ANA, "Monitor", "private monitor", false).await;
	let bike = h.resource(BO, "Bicycle", "road bike", true).await;
	let search = |q: &str| SearchRequest { q: Some(q.to_string()), ..Default::default() };
	let found = h
		.service
		.search_items(ItemKind::Resource, search("mon"), None)
		.await
		.expect("Search failed.");

	assert_eq!(found.len(), 1);
	assert_eq!(found[0].id, coat.id);

	let found = h
		.service
		.search_items(ItemKind::Resource, search("MON"), Some(ANA))
		.await
		.expect("Search failed.");

	assert_eq!(
		found.iter().map(|item| item.id.as_str()).collect::<Vec<_>>(),
		vec![private.id.as_str(), coat.id.as_str()],
		"Owner sees own private items, newest first."
	);

	let req = SearchRequest {
		attributes: vec![("size".to_string(), "med".to_string())],
		..Default::default()
	};
	let found =
		h.service.search_items(ItemKind::Resource, req, None).await.expect("Search failed.");

	assert_eq!(found.len(), 1);
	assert_eq!(found[0].id, coat.id);

	let req = SearchRequest { owner: Some(BO.to_string()), ..Default::default() };
	let found =
		h.service.search_items(ItemKind::Resource, req, Some(ANA)).await.expect("Search failed.");

	assert_eq!(found.len(), 1);
	assert_eq!(found[0].id, bike.id);

	let req = SearchRequest { limit: Some(1), offset: Some(1), ..Default::default() };
	let found =
		h.service.search_items(ItemKind::Resource, req, None).await.expect("Search failed.");

	assert_eq!(found.len(), 1);
	assert_eq!(found[0].id, coat.id);

	let req = SearchRequest { limit: Some(0), ..Default::default() };

	assert!(matches!(
		h.service.search_items(ItemKind::Resource, req, None).await,
		Err(Error::Validation { .. })
	));

	let mine = h.service.list_owned(ItemKind::Resource, ANA).await.expect("Listing failed.");

	assert_eq!(mine.len(), 2);
}

#[tokio::test]
async fn private_items_read_as_missing_for_others() {
	let h = harness();
	let secret = h.resource(ANA, "ring", "private ring", false).await;

	assert!(h.service.get_item(ItemKind::Resource, &secret.id, Some(ANA)).await.is_ok());
	assert!(matches!(
		h.service.get_item(ItemKind::Resource, &secret.id, Some(BO)).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		h.service.set_visibility(ItemKind::Resource, &secret.id, true, Some(BO)).await,
		Err(Error::NotFound { .. })
	));
}
