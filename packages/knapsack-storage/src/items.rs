use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::{Error, Result, db::Db, models::ItemRow};
use knapsack_domain::{Item, ItemKind, text};

const ITEM_COLUMNS: &str =
	"id, name, owner, description, quantity, public, attributes, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
	/// Tokenized query terms; each must prefix-match a token of the item.
	pub terms: Vec<String>,
	pub owner: Option<String>,
	/// When set, private rows are only returned if owned by this identity.
	pub visible_to: Option<String>,
	pub public_only: bool,
	pub attributes: Vec<(String, String)>,
	pub limit: i64,
	pub offset: i64,
}

/// Lexemes from the same tokenizer the in-memory search uses.
fn search_lexemes(item: &Item) -> Vec<String> {
	text::tokenize(&text::searchable_text(item))
}

pub async fn insert_item(db: &Db, item: &Item) -> Result<()> {
	let sql = format!(
		"\
INSERT INTO {} (
	id, name, owner, description, quantity, public, attributes, created_at, updated_at,
	search_document
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, array_to_tsvector($10::text[]))",
		item.kind.table()
	);

	sqlx::query(&sql)
		.bind(item.id.as_str())
		.bind(item.name.as_str())
		.bind(item.owner.as_deref())
		.bind(item.description.as_deref())
		.bind(item.quantity)
		.bind(item.public)
		.bind(Value::Object(item.attributes.clone()))
		.bind(item.created_at)
		.bind(item.updated_at)
		.bind(search_lexemes(item))
		.execute(&db.pool)
		.await
		.map_err(|err| match err.as_database_error() {
			Some(db_err) if db_err.is_unique_violation() =>
				Error::Conflict(format!("{} {} already exists.", item.kind.as_str(), item.id)),
			_ => Error::Sqlx(err),
		})?;

	Ok(())
}

pub async fn fetch_item(db: &Db, kind: ItemKind, id: &str) -> Result<Option<ItemRow>> {
	let sql = format!("SELECT {ITEM_COLUMNS} FROM {} WHERE id = $1", kind.table());
	let row = sqlx::query_as::<_, ItemRow>(&sql).bind(id).fetch_optional(&db.pool).await?;

	Ok(row)
}

pub async fn fetch_items(db: &Db, kind: ItemKind, ids: &[String]) -> Result<Vec<ItemRow>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let sql = format!("SELECT {ITEM_COLUMNS} FROM {} WHERE id = ANY($1)", kind.table());
	let rows = sqlx::query_as::<_, ItemRow>(&sql).bind(ids).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn search_items(db: &Db, kind: ItemKind, query: &ItemQuery) -> Result<Vec<ItemRow>> {
	let mut builder: QueryBuilder<'_, Postgres> =
		QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM {} WHERE TRUE", kind.table()));

	if let Some(tsquery) = text::prefix_tsquery(&query.terms) {
		builder.push(" AND search_document @@ ");
		builder.push_bind(tsquery);
		builder.push("::tsquery");
	}
	if let Some(owner) = query.owner.as_ref() {
		builder.push(" AND owner = ");
		builder.push_bind(owner.clone());
	}
	if query.public_only {
		builder.push(" AND public");
	} else if let Some(visible_to) = query.visible_to.as_ref() {
		builder.push(" AND (public OR owner = ");
		builder.push_bind(visible_to.clone());
		builder.push(")");
	}

	for (key, needle) in &query.attributes {
		builder.push(" AND attributes ->> ");
		builder.push_bind(key.clone());
		builder.push(" ILIKE ");
		builder.push_bind(format!("%{}%", escape_like(needle)));
	}

	builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
	builder.push_bind(query.limit);
	builder.push(" OFFSET ");
	builder.push_bind(query.offset);

	let rows = builder.build_query_as::<ItemRow>().fetch_all(&db.pool).await?;

	Ok(rows)
}

/// Resources a need owned by `owner` may be matched against: public ones plus the owner's own.
pub async fn list_pool(db: &Db, owner: Option<&str>, limit: i64) -> Result<Vec<ItemRow>> {
	let sql = format!(
		"\
SELECT {ITEM_COLUMNS}
FROM resources
WHERE public OR ($1::text IS NOT NULL AND owner = $1)
ORDER BY created_at DESC, id DESC
LIMIT $2"
	);
	let rows =
		sqlx::query_as::<_, ItemRow>(&sql).bind(owner).bind(limit).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn update_item(db: &Db, item: &Item) -> Result<Option<ItemRow>> {
	let sql = format!(
		"\
UPDATE {}
SET
	name = $1,
	description = $2,
	quantity = $3,
	public = $4,
	attributes = $5,
	updated_at = GREATEST($6, updated_at),
	search_document = array_to_tsvector($8::text[])
WHERE id = $7
RETURNING {ITEM_COLUMNS}",
		item.kind.table()
	);
	let row = sqlx::query_as::<_, ItemRow>(&sql)
		.bind(item.name.as_str())
		.bind(item.description.as_deref())
		.bind(item.quantity)
		.bind(item.public)
		.bind(Value::Object(item.attributes.clone()))
		.bind(item.updated_at)
		.bind(item.id.as_str())
		.bind(search_lexemes(item))
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn set_public(
	db: &Db,
	kind: ItemKind,
	id: &str,
	public: bool,
) -> Result<Option<ItemRow>> {
	let sql = format!(
		"\
UPDATE {}
SET public = $1, updated_at = GREATEST(now(), updated_at)
WHERE id = $2
RETURNING {ITEM_COLUMNS}",
		kind.table()
	);
	let row = sqlx::query_as::<_, ItemRow>(&sql)
		.bind(public)
		.bind(id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn delete_item(db: &Db, kind: ItemKind, id: &str) -> Result<bool> {
	let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
	let result = sqlx::query(&sql).bind(id).execute(&db.pool).await?;

	Ok(result.rows_affected() > 0)
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '\\' | '%' | '_') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
