use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;



pub const PREVIEW_PERIOD: Duration = Duration::from_secs(1);
pub const TELEMETRY_PERIOD: Duration = Duration::from_secs(2);

/// A cancellable periodic task owned by one session.
///
/// The first tick fires one full period after spawning. Dropping the ticker cancels it; a tick
/// that is already running finishes, so the work it commits must be checked against
/// `generation()` by the owner.
pub struct Ticker {
	generation: u64,
	token: CancellationToken,
}

impl Ticker {
	pub fn spawn<F, Fut>(generation: u64, period: Duration, mut tick: F) -> Ticker
	where
		F: FnMut() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let token = CancellationToken::new();
		let cancelled = token.clone();

		tokio::spawn(async move {
			// interval() ticks immediately, interval_at() lets the first period elapse
			let mut interval = time::interval_at(Instant::now() + period, period);
			// A slow camera should not get a burst of catch-up fetches
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					biased;
					_ = cancelled.cancelled() => break,
					_ = interval.tick() => tick().await,
				}
			}
			debug!("Ticker {} stopped", generation);
		});

		Ticker { generation, token }
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}
}

impl Drop for Ticker {
	fn drop(&mut self) {
		self.token.cancel();
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn counting_ticker(period: Duration) -> (Ticker, Arc<AtomicUsize>) {
		let count = Arc::new(AtomicUsize::new(0));
		let counter = count.clone();
		let ticker = Ticker::spawn(1, period, move || {
			let counter = counter.clone();
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
			}
		});
		(ticker, count)
	}

	#[tokio::test(start_paused = true)]
	async fn first_tick_waits_a_full_period() {
		let (_ticker, count) = counting_ticker(PREVIEW_PERIOD);

		time::sleep(Duration::from_millis(900)).await;
		assert_eq!(count.load(Ordering::SeqCst), 0);

		time::sleep(Duration::from_millis(2600)).await;
		assert_eq!(count.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn dropping_stops_further_ticks() {
		let (ticker, count) = counting_ticker(TELEMETRY_PERIOD);

		time::sleep(Duration::from_millis(4500)).await;
		assert_eq!(count.load(Ordering::SeqCst), 2);

		drop(ticker);
		time::sleep(Duration::from_secs(10)).await;
		assert_eq!(count.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn slow_ticks_do_not_burst() {
		let count = Arc::new(AtomicUsize::new(0));
		let counter = count.clone();
		let _ticker = Ticker::spawn(7, PREVIEW_PERIOD, move || {
			let counter = counter.clone();
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				time::sleep(Duration::from_millis(2500)).await;
			}
		});

		// Ticks start at 1s and 3.5s; the deadlines missed in between are not replayed
		time::sleep(Duration::from_millis(5000)).await;
		assert_eq!(count.load(Ordering::SeqCst), 2);
	}
}
