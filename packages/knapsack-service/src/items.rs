use time::OffsetDateTime;

use crate::{Error, KnapsackService, Result};
use knapsack_domain::{Item, ItemKind, ItemPatch, NewItem, OwnerViolation, item, text};
use knapsack_storage::items::ItemQuery;

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
	pub q: Option<String>,
	pub owner: Option<String>,
	/// `(key, substring)` pairs; every pair must match.
	pub attributes: Vec<(String, String)>,
	pub limit: Option<u32>,
	pub offset: Option<u32>,
}

impl KnapsackService {
	/// Stores a new item. A requester becomes the owner unless the body names someone else.
	pub async fn create_item(
		&self,
		kind: ItemKind,
		mut new: NewItem,
		requester: Option<&str>,
	) -> Result<Item> {
		new.validate()?;

		if let Some(requester) = requester {
			match new.owner.as_deref() {
				None => new.owner = Some(requester.to_string()),
				Some(owner) if owner == requester => {},
				Some(_) => {
					return Err(Error::Forbidden {
						message: format!("Cannot create a {} owned by someone else.", kind.as_str()),
					});
				},
			}
		}

		let now = OffsetDateTime::now_utc();
		let item = Item {
			id: knapsack_storage::new_id(),
			kind,
			name: new.name.trim().to_string(),
			description: new.description,
			quantity: new.quantity,
			owner: new.owner,
			public: new.public,
			attributes: new.attributes,
			created_at: now,
			updated_at: now,
		};

		self.items.insert(&item).await?;

		tracing::debug!(kind = kind.as_str(), id = %item.id, "Item created.");

		Ok(item)
	}

	/// Private items read as absent to anyone but their owner.
	pub async fn get_item(&self, kind: ItemKind, id: &str, requester: Option<&str>) -> Result<Item> {
		match self.items.get(kind, id).await? {
			Some(item) if item.is_visible_to(requester) => Ok(item),
			_ => Err(Error::not_found(kind.as_str(), id)),
		}
	}

	pub async fn search_items(
		&self,
		kind: ItemKind,
		req: SearchRequest,
		requester: Option<&str>,
	) -> Result<Vec<Item>> {
		let limit = match req.limit {
			Some(0) => {
				return Err(Error::Validation {
					message: "limit must be greater than zero.".to_string(),
					field: Some("$.limit".to_string()),
				});
			},
			Some(limit) => limit.min(self.cfg.search.max_limit),
			None => self.cfg.search.default_limit,
		};
		let query = ItemQuery {
			terms: req.q.as_deref().map(text::tokenize_query).unwrap_or_default(),
			owner: req.owner.filter(|owner| !owner.trim().is_empty()),
			visible_to: requester.map(str::to_string),
			public_only: requester.is_none(),
			attributes: req.attributes,
			limit: i64::from(limit),
			offset: i64::from(req.offset.unwrap_or(0)),
		};

		self.items.search(kind, &query).await
	}

	/// The requester's own items, public and private, newest first.
	pub async fn list_owned(&self, kind: ItemKind, requester: &str) -> Result<Vec<Item>> {
		let query = ItemQuery {
			owner: Some(requester.to_string()),
			visible_to: Some(requester.to_string()),
			limit: i64::from(self.cfg.search.max_limit),
			..Default::default()
		};

		self.items.search(kind, &query).await
	}

	/// Applies a patch to the mutable fields. `owner` may be repeated but never changed or added.
	pub async fn update_item(
		&self,
		kind: ItemKind,
		id: &str,
		patch: ItemPatch,
		requester: Option<&str>,
	) -> Result<Item> {
		patch.validate()?;

		let mut stored = self.load_for_write(kind, id, requester).await?;

		item::check_owner(stored.owner.as_deref(), patch.owner.as_deref()).map_err(|err| {
			let message = match err {
				OwnerViolation::Changed { stored } =>
					format!("owner is {stored} and cannot be changed."),
				OwnerViolation::Assigned => "owner can only be set at creation.".to_string(),
			};

			Error::ImmutableField { field: "$.owner".to_string(), message }
		})?;

		if patch.is_empty() {
			return Err(Error::validation("Patch must change at least one field."));
		}

		patch.apply(&mut stored, OffsetDateTime::now_utc());

		self.items.update(&stored).await?.ok_or_else(|| Error::not_found(kind.as_str(), id))
	}

	/// Idempotent: setting the current value succeeds.
	pub async fn set_visibility(
		&self,
		kind: ItemKind,
		id: &str,
		public: bool,
		requester: Option<&str>,
	) -> Result<Item> {
		self.load_for_write(kind, id, requester).await?;
		self.items
			.set_public(kind, id, public)
			.await?
			.ok_or_else(|| Error::not_found(kind.as_str(), id))
	}

	pub async fn delete_item(&self, kind: ItemKind, id: &str, requester: Option<&str>) -> Result<()> {
		self.load_for_write(kind, id, requester).await?;

		if !self.items.delete(kind, id).await? {
			return Err(Error::not_found(kind.as_str(), id));
		}

		Ok(())
	}

	/// Loads an item for mutation. With a requester, only the owner may write.
	async fn load_for_write(
		&self,
		kind: ItemKind,
		id: &str,
		requester: Option<&str>,
	) -> Result<Item> {
		let stored =
			self.items.get(kind, id).await?.ok_or_else(|| Error::not_found(kind.as_str(), id))?;

		if let Some(requester) = requester
			&& !stored.is_owned_by(requester)
		{
			if !stored.is_visible_to(Some(requester)) {
				return Err(Error::not_found(kind.as_str(), id));
			}

			return Err(Error::Forbidden {
				message: format!("Only the owner may modify {} {id}.", kind.as_str()),
			});
		}

		Ok(stored)
	}
}
