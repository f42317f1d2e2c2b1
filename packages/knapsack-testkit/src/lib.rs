//! Throwaway Postgres databases for integration tests that opt in through `KNAPSACK_PG_DSN`.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

const DSN_ENV: &str = "KNAPSACK_PG_DSN";
/// Tried in order when looking for a maintenance database to issue CREATE/DROP from.
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

/// The DSN of the server integration tests may use, if configured.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

/// A database that exists for one test. Dropped by [`TestDatabase::cleanup`] or, failing that, on
/// drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("{DSN_ENV} is not a valid DSN: {err}.")))?;
		let (maintenance, mut conn) = maintenance_connection(&base).await?;
		let name = format!("knapsack_test_{}", Uuid::new_v4().simple());

		sqlx::query(&format!(r#"CREATE DATABASE "{name}""#))
			.execute(&mut conn)
			.await
			.map_err(|err| Error::Message(format!("Could not create {name}: {err}.")))?;
		conn.close().await?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.maintenance, &self.name).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let maintenance = self.maintenance.clone();
		// The test runtime may already be shutting down, so drop from a private one.
		let handle = thread::spawn(move || {
			let outcome = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(err.to_string()))
				.and_then(|runtime| runtime.block_on(drop_database(&maintenance, &name)));

			if let Err(err) = outcome {
				eprintln!("Leaked test database {name}: {err}");
			}
		});

		let _ = handle.join();
	}
}

async fn maintenance_connection(
	base: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut failures = Vec::new();

	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => failures.push(format!("{database}: {err}")),
		}
	}

	Err(Error::Message(format!("No maintenance database reachable ({}).", failures.join("; "))))
}

async fn drop_database(maintenance: &PgConnectOptions, name: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	sqlx::query(&format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#))
		.execute(&mut conn)
		.await
		.map_err(|err| Error::Message(format!("Could not drop {name}: {err}.")))?;
	conn.close().await?;

	Ok(())
}
