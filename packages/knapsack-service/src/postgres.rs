use crate::{BoxFuture, CandidateStore, ItemStore, MatchRun, Result};
use knapsack_domain::{Item, ItemKind, MatchCandidate};
use knapsack_storage::{
	candidates,
	db::Db,
	items::{self, ItemQuery},
	models::{ItemRow, MatchCandidateRow, MatchRunRow},
};

fn to_run(row: MatchRunRow) -> MatchRun {
	MatchRun {
		run_id: row.run_id,
		need_id: row.need_id,
		top_k: row.top_k.max(0) as u32,
		pool_size: row.pool_size.max(0) as u32,
		candidate_count: row.candidate_count.max(0) as u32,
		created_at: row.created_at,
	}
}

fn to_items(rows: Vec<ItemRow>, kind: ItemKind) -> Vec<Item> {
	rows.into_iter().map(|row| row.into_item(kind)).collect()
}

fn to_candidate(row: Option<MatchCandidateRow>) -> Result<Option<MatchCandidate>> {
	Ok(row.map(MatchCandidateRow::into_candidate).transpose()?)
}

impl ItemStore for Db {
	fn insert<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(items::insert_item(self, item).await?) })
	}

	fn get<'a>(&'a self, kind: ItemKind, id: &'a str) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move {
			Ok(items::fetch_item(self, kind, id).await?.map(|row| row.into_item(kind)))
		})
	}

	fn get_many<'a>(
		&'a self,
		kind: ItemKind,
		ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move { Ok(to_items(items::fetch_items(self, kind, ids).await?, kind)) })
	}

	fn search<'a>(
		&'a self,
		kind: ItemKind,
		query: &'a ItemQuery,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move { Ok(to_items(items::search_items(self, kind, query).await?, kind)) })
	}

	fn update<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move {
			Ok(items::update_item(self, item).await?.map(|row| row.into_item(item.kind)))
		})
	}

	fn set_public<'a>(
		&'a self,
		kind: ItemKind,
		id: &'a str,
		public: bool,
	) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move {
			Ok(items::set_public(self, kind, id, public).await?.map(|row| row.into_item(kind)))
		})
	}

	fn delete<'a>(&'a self, kind: ItemKind, id: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(items::delete_item(self, kind, id).await?) })
	}

	fn resource_pool<'a>(
		&'a self,
		owner: Option<&'a str>,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move {
			let rows = items::list_pool(self, owner, limit as i64).await?;

			Ok(to_items(rows, ItemKind::Resource))
		})
	}
}

impl CandidateStore for Db {
	fn record_run<'a>(
		&'a self,
		run: &'a MatchRun,
		batch: &'a [MatchCandidate],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let run_row = MatchRunRow {
				run_id: run.run_id,
				need_id: run.need_id.clone(),
				top_k: run.top_k as i32,
				pool_size: run.pool_size as i32,
				candidate_count: run.candidate_count as i32,
				created_at: run.created_at,
			};
			let rows = batch
				.iter()
				.map(|candidate| MatchCandidateRow::from_candidate(run.run_id, candidate))
				.collect::<knapsack_storage::Result<Vec<_>>>()?;

			candidates::insert_run(self, &run_row, &rows).await?;

			Ok(())
		})
	}

	fn list_for_need<'a>(&'a self, need_id: &'a str) -> BoxFuture<'a, Result<Vec<MatchCandidate>>> {
		Box::pin(async move {
			let rows = candidates::list_for_need(self, need_id).await?;

			Ok(rows
				.into_iter()
				.map(MatchCandidateRow::into_candidate)
				.collect::<knapsack_storage::Result<Vec<_>>>()?)
		})
	}

	fn latest_run<'a>(&'a self, need_id: &'a str) -> BoxFuture<'a, Result<Option<MatchRun>>> {
		Box::pin(async move { Ok(candidates::latest_run(self, need_id).await?.map(to_run)) })
	}

	fn get_candidate<'a>(
		&'a self,
		candidate_id: &'a str,
	) -> BoxFuture<'a, Result<Option<MatchCandidate>>> {
		Box::pin(async move { to_candidate(candidates::fetch_candidate(self, candidate_id).await?) })
	}

	fn mark_selected<'a>(
		&'a self,
		candidate_id: &'a str,
	) -> BoxFuture<'a, Result<Option<MatchCandidate>>> {
		Box::pin(async move { to_candidate(candidates::mark_selected(self, candidate_id).await?) })
	}

	fn unmatched_needs<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move {
			let rows = candidates::list_unmatched_public_needs(self, limit as i64).await?;

			Ok(to_items(rows, ItemKind::Need))
		})
	}
}
