use sqlx::{Executor, Postgres, Transaction};

use crate::{
	Result,
	db::Db,
	models::{ItemRow, MatchCandidateRow, MatchRunRow},
};

const CANDIDATE_COLUMNS: &str = "id, run_id, need_id, resource_id, match_reason, match_statistics, created_at, selected";

/// Records one match run and all of its candidates, or nothing.
pub async fn insert_run(db: &Db, run: &MatchRunRow, candidates: &[MatchCandidateRow]) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	insert_run_tx(&mut tx, run, candidates).await?;

	tx.commit().await?;

	Ok(())
}

pub async fn insert_run_tx(
	tx: &mut Transaction<'_, Postgres>,
	run: &MatchRunRow,
	candidates: &[MatchCandidateRow],
) -> Result<()> {
	insert_run_exec(&mut **tx, run).await?;

	for candidate in candidates {
		insert_candidate_exec(&mut **tx, candidate).await?;
	}

	Ok(())
}

/// Candidates for a need, newest run first and scorer rank within a run.
pub async fn list_for_need(db: &Db, need_id: &str) -> Result<Vec<MatchCandidateRow>> {
	let sql = format!(
		"\
SELECT {CANDIDATE_COLUMNS}
FROM match_candidates
WHERE need_id = $1
ORDER BY created_at DESC, (match_statistics ->> 'rank')::integer ASC, id ASC"
	);
	let rows =
		sqlx::query_as::<_, MatchCandidateRow>(&sql).bind(need_id).fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn latest_run(db: &Db, need_id: &str) -> Result<Option<MatchRunRow>> {
	let row = sqlx::query_as::<_, MatchRunRow>(
		"\
SELECT run_id, need_id, top_k, pool_size, candidate_count, created_at
FROM match_runs
WHERE need_id = $1
ORDER BY created_at DESC
LIMIT 1",
	)
	.bind(need_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn fetch_candidate(db: &Db, candidate_id: &str) -> Result<Option<MatchCandidateRow>> {
	let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM match_candidates WHERE id = $1");
	let row = sqlx::query_as::<_, MatchCandidateRow>(&sql)
		.bind(candidate_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn mark_selected(db: &Db, candidate_id: &str) -> Result<Option<MatchCandidateRow>> {
	let sql = format!(
		"UPDATE match_candidates SET selected = true WHERE id = $1 RETURNING {CANDIDATE_COLUMNS}"
	);
	let row = sqlx::query_as::<_, MatchCandidateRow>(&sql)
		.bind(candidate_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

/// Public needs that have never been matched, oldest first.
pub async fn list_unmatched_public_needs(db: &Db, limit: i64) -> Result<Vec<ItemRow>> {
	let rows = sqlx::query_as::<_, ItemRow>(
		"\
SELECT n.id, n.name, n.owner, n.description, n.quantity, n.public, n.attributes, n.created_at, n.updated_at
FROM needs n
WHERE n.public
	AND NOT EXISTS (SELECT 1 FROM match_runs r WHERE r.need_id = n.id)
ORDER BY n.created_at ASC, n.id ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

async fn insert_run_exec<'e, E>(executor: E, run: &MatchRunRow) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO match_runs (run_id, need_id, top_k, pool_size, candidate_count, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(run.run_id)
	.bind(run.need_id.as_str())
	.bind(run.top_k)
	.bind(run.pool_size)
	.bind(run.candidate_count)
	.bind(run.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

async fn insert_candidate_exec<'e, E>(executor: E, candidate: &MatchCandidateRow) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO match_candidates (
	id,
	run_id,
	need_id,
	resource_id,
	match_reason,
	match_statistics,
	created_at,
	selected
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
	)
	.bind(candidate.id.as_str())
	.bind(candidate.run_id)
	.bind(candidate.need_id.as_str())
	.bind(candidate.resource_id.as_str())
	.bind(candidate.match_reason.as_deref())
	.bind(&candidate.match_statistics)
	.bind(candidate.created_at)
	.bind(candidate.selected)
	.execute(executor)
	.await?;

	Ok(())
}
