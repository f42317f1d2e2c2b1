//! In-process store backing both traits. Used by `storage.backend = "memory"` and by tests.

use std::{
	cmp::Reverse,
	collections::HashMap,
	sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;

use crate::{BoxFuture, CandidateStore, Error, ItemStore, MatchRun, Result};
use knapsack_domain::{Item, ItemKind, MatchCandidate, text};
use knapsack_storage::items::ItemQuery;

#[derive(Default)]
struct State {
	needs: HashMap<String, Item>,
	resources: HashMap<String, Item>,
	runs: Vec<MatchRun>,
	candidates: Vec<MatchCandidate>,
	/// When set, the next run write fails after staging this many candidate rows.
	fail_run_after: Option<usize>,
}
impl State {
	fn table(&self, kind: ItemKind) -> &HashMap<String, Item> {
		match kind {
			ItemKind::Need => &self.needs,
			ItemKind::Resource => &self.resources,
		}
	}

	fn table_mut(&mut self, kind: ItemKind) -> &mut HashMap<String, Item> {
		match kind {
			ItemKind::Need => &mut self.needs,
			ItemKind::Resource => &mut self.resources,
		}
	}
}

#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes the next `record_run` fail after `rows` candidates were staged.
	pub fn fail_next_run_after(&self, rows: usize) {
		self.lock().fail_run_after = Some(rows);
	}

	pub fn run_count(&self, need_id: &str) -> usize {
		self.lock().runs.iter().filter(|run| run.need_id == need_id).count()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn record(&self, run: &MatchRun, candidates: &[MatchCandidate]) -> Result<()> {
		let mut state = self.lock();
		let fail_after = state.fail_run_after.take();
		let mut staged = Vec::with_capacity(candidates.len());

		for candidate in candidates {
			if fail_after == Some(staged.len()) {
				break;
			}

			staged.push(candidate.clone());
		}

		if fail_after == Some(staged.len()) {
			return Err(Error::Storage {
				message: format!("Injected write failure after {} rows.", staged.len()),
			});
		}

		state.runs.push(run.clone());
		state.candidates.extend(staged);

		Ok(())
	}
}

fn newest_first(items: &mut [Item]) {
	items.sort_by_key(|item| Reverse((item.created_at, item.id.clone())));
}

fn matches_query(item: &Item, query: &ItemQuery) -> bool {
	if let Some(owner) = query.owner.as_deref()
		&& item.owner.as_deref() != Some(owner)
	{
		return false;
	}
	if query.public_only && !item.public {
		return false;
	}
	if !query.public_only
		&& let Some(visible_to) = query.visible_to.as_deref()
		&& !item.is_visible_to(Some(visible_to))
	{
		return false;
	}

	query
		.attributes
		.iter()
		.all(|(key, needle)| text::attribute_contains(&item.attributes, key, needle))
		&& text::item_matches_query(item, &query.terms)
}

impl ItemStore for MemoryStore {
	fn insert<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut state = self.lock();
			let table = state.table_mut(item.kind);

			if table.contains_key(&item.id) {
				return Err(Error::validation(format!(
					"{} {} already exists.",
					item.kind.as_str(),
					item.id
				)));
			}

			table.insert(item.id.clone(), item.clone());

			Ok(())
		})
	}

	fn get<'a>(&'a self, kind: ItemKind, id: &'a str) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move { Ok(self.lock().table(kind).get(id).cloned()) })
	}

	fn get_many<'a>(
		&'a self,
		kind: ItemKind,
		ids: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move {
			let state = self.lock();
			let table = state.table(kind);

			Ok(ids.iter().filter_map(|id| table.get(id).cloned()).collect())
		})
	}

	fn search<'a>(
		&'a self,
		kind: ItemKind,
		query: &'a ItemQuery,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move {
			let mut found = self
				.lock()
				.table(kind)
				.values()
				.filter(|item| matches_query(item, query))
				.cloned()
				.collect::<Vec<_>>();

			newest_first(&mut found);

			Ok(found
				.into_iter()
				.skip(query.offset.max(0) as usize)
				.take(query.limit.max(0) as usize)
				.collect())
		})
	}

	fn update<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move {
			let mut state = self.lock();
			let Some(stored) = state.table_mut(item.kind).get_mut(&item.id) else {
				return Ok(None);
			};

			stored.name = item.name.clone();
			stored.description = item.description.clone();
			stored.quantity = item.quantity;
			stored.public = item.public;
			stored.attributes = item.attributes.clone();
			stored.updated_at = item.updated_at.max(stored.updated_at);

			Ok(Some(stored.clone()))
		})
	}

	fn set_public<'a>(
		&'a self,
		kind: ItemKind,
		id: &'a str,
		public: bool,
	) -> BoxFuture<'a, Result<Option<Item>>> {
		Box::pin(async move {
			let mut state = self.lock();
			let Some(stored) = state.table_mut(kind).get_mut(id) else { return Ok(None) };

			stored.public = public;
			stored.updated_at = OffsetDateTime::now_utc().max(stored.updated_at);

			Ok(Some(stored.clone()))
		})
	}

	fn delete<'a>(&'a self, kind: ItemKind, id: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.lock().table_mut(kind).remove(id).is_some()) })
	}

	fn resource_pool<'a>(
		&'a self,
		owner: Option<&'a str>,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move {
			let mut pool = self
				.lock()
				.resources
				.values()
				.filter(|item| item.is_visible_to(owner))
				.cloned()
				.collect::<Vec<_>>();

			newest_first(&mut pool);
			pool.truncate(limit);

			Ok(pool)
		})
	}
}

impl CandidateStore for MemoryStore {
	fn record_run<'a>(
		&'a self,
		run: &'a MatchRun,
		candidates: &'a [MatchCandidate],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.record(run, candidates) })
	}

	fn list_for_need<'a>(&'a self, need_id: &'a str) -> BoxFuture<'a, Result<Vec<MatchCandidate>>> {
		Box::pin(async move {
			let mut found = self
				.lock()
				.candidates
				.iter()
				.filter(|candidate| candidate.need_id == need_id)
				.cloned()
				.collect::<Vec<_>>();

			found.sort_by(|a, b| {
				b.created_at
					.cmp(&a.created_at)
					.then(a.match_statistics.rank.cmp(&b.match_statistics.rank))
					.then(a.id.cmp(&b.id))
			});

			Ok(found)
		})
	}

	fn latest_run<'a>(&'a self, need_id: &'a str) -> BoxFuture<'a, Result<Option<MatchRun>>> {
		Box::pin(async move {
			Ok(self
				.lock()
				.runs
				.iter()
				.filter(|run| run.need_id == need_id)
				.max_by_key(|run| run.created_at)
				.cloned())
		})
	}

	fn get_candidate<'a>(
		&'a self,
		candidate_id: &'a str,
	) -> BoxFuture<'a, Result<Option<MatchCandidate>>> {
		Box::pin(async move {
			Ok(self.lock().candidates.iter().find(|candidate| candidate.id == candidate_id).cloned())
		})
	}

	fn mark_selected<'a>(
		&'a self,
		candidate_id: &'a str,
	) -> BoxFuture<'a, Result<Option<MatchCandidate>>> {
		Box::pin(async move {
			let mut state = self.lock();
			let Some(candidate) =
				state.candidates.iter_mut().find(|candidate| candidate.id == candidate_id)
			else {
				return Ok(None);
			};

			candidate.selected = true;

			Ok(Some(candidate.clone()))
		})
	}

	fn unmatched_needs<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<Item>>> {
		Box::pin(async move {
			let state = self.lock();
			let mut needs = state
				.needs
				.values()
				.filter(|need| need.public && !state.runs.iter().any(|run| run.need_id == need.id))
				.cloned()
				.collect::<Vec<_>>();

			needs.sort_by_key(|need| (need.created_at, need.id.clone()));
			needs.truncate(limit);

			Ok(needs)
		})
	}
}
