use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-need single-flight locks for match runs. Distinct needs never share a lock.
#[derive(Default)]
pub(crate) struct InflightRuns {
	locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl InflightRuns {
	pub(crate) async fn acquire(&self, need_id: &str) -> RunGuard<'_> {
		let lock = {
			let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

			locks.entry(need_id.to_string()).or_default().clone()
		};
		let guard = lock.lock_owned().await;

		RunGuard { runs: self, need_id: need_id.to_string(), guard: Some(guard) }
	}

	pub(crate) fn is_running(&self, need_id: &str) -> bool {
		let locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

		locks.get(need_id).map(|lock| lock.try_lock().is_err()).unwrap_or(false)
	}

	fn release(&self, need_id: &str, guard: OwnedMutexGuard<()>) {
		let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

		drop(guard);

		// Only the map still references the lock once nobody else waits on it.
		if locks.get(need_id).map(|lock| Arc::strong_count(lock) == 1).unwrap_or(false) {
			locks.remove(need_id);
		}
	}
}

pub(crate) struct RunGuard<'a> {
	runs: &'a InflightRuns,
	need_id: String,
	guard: Option<OwnedMutexGuard<()>>,
}
impl Drop for RunGuard<'_> {
	fn drop(&mut self) {
		if let Some(guard) = self.guard.take() {
			self.runs.release(&self.need_id, guard);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn lock_is_reported_while_held_and_cleaned_up_after() {
		let runs = InflightRuns::default();

		assert!(!runs.is_running("n1"));

		let guard = runs.acquire("n1").await;

		assert!(runs.is_running("n1"));
		assert!(!runs.is_running("n2"));

		drop(guard);

		assert!(!runs.is_running("n1"));
		assert!(runs.locks.lock().unwrap_or_else(|err| err.into_inner()).is_empty());
	}
}
