use tracing::info;

use crate::domain::{DomainError, NoiseCheckOutcome, NoiseConfig};
use crate::ports::NoiseDetector;

/// Measure ambient noise for the configured window and judge it against the
/// configured ceiling.
///
/// The detector is always stopped once measuring has started.
pub async fn run_noise_check<N>(
    detector: &N,
    config: &NoiseConfig,
) -> Result<NoiseCheckOutcome, DomainError>
where
    N: NoiseDetector + ?Sized,
{
    detector.start_measuring().await?;
    let average = detector.average_decibel();

    tokio::time::sleep(config.test_duration()).await;

    let average_db = *average.borrow();
    detector.stop_measuring().await;

    let outcome = NoiseCheckOutcome::evaluate(average_db, config.max_average_db);
    info!(
        average_db = outcome.average_db,
        passed = outcome.passed,
        "Noise check finished"
    );
    Ok(outcome)
}
