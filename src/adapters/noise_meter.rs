use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::domain::noise::pcm_decibel;
use crate::domain::{DecibelMeter, DomainError, NoiseConfig};
use crate::infrastructure::{Liveness, PollTask};
use crate::ports::{NoiseDetector, PcmSource};

/// [`NoiseDetector`] that meters raw PCM from a [`PcmSource`].
///
/// Every interval one frame is read, converted to the gauge scale and
/// folded into a rolling average.
pub struct PcmNoiseDetector<S: PcmSource + 'static> {
    source: Arc<S>,
    interval: Duration,
    history: Option<usize>,
    current_db: Arc<watch::Sender<f32>>,
    average_db: Arc<watch::Sender<f32>>,
    sampler: Mutex<Option<PollTask>>,
}

impl<S: PcmSource + 'static> PcmNoiseDetector<S> {
    pub fn new(source: S, config: &NoiseConfig) -> Self {
        let (current_db, _) = watch::channel(0.0);
        let (average_db, _) = watch::channel(0.0);
        Self {
            source: Arc::new(source),
            interval: config.sample_interval(),
            history: config.history_capacity(),
            current_db: Arc::new(current_db),
            average_db: Arc::new(average_db),
            sampler: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn spawn_sampler(&self) -> PollTask {
        let source = Arc::clone(&self.source);
        let current_db = Arc::clone(&self.current_db);
        let average_db = Arc::clone(&self.average_db);
        let interval = self.interval;
        let mut meter = DecibelMeter::new(self.history);

        PollTask::spawn(move |live| async move {
            let mut frame = vec![0i16; source.frame_len().max(1)];
            while live.is_alive() {
                let read = source.read(&mut frame);
                if read > 0 {
                    let db = pcm_decibel(&frame[..read]);
                    let average = meter.push(db);
                    if !publish(&live, &current_db, &average_db, db, average) {
                        break;
                    }
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}

fn publish(
    live: &Liveness,
    current_db: &watch::Sender<f32>,
    average_db: &watch::Sender<f32>,
    db: f32,
    average: f32,
) -> bool {
    if !live.is_alive() {
        return false;
    }
    current_db.send_replace(db);
    average_db.send_replace(average);
    true
}

#[async_trait]
impl<S: PcmSource + 'static> NoiseDetector for PcmNoiseDetector<S> {
    fn current_decibel(&self) -> watch::Receiver<f32> {
        self.current_db.subscribe()
    }

    fn average_decibel(&self) -> watch::Receiver<f32> {
        self.average_db.subscribe()
    }

    async fn start_measuring(&self) -> Result<(), DomainError> {
        let mut sampler = self.sampler.lock().await;

        if let Some(previous) = sampler.take() {
            debug!("Restarting noise measurement");
            previous.cancel();
            self.source.close().await;
        }

        self.current_db.send_replace(0.0);
        self.average_db.send_replace(0.0);

        if let Err(e) = self.source.open().await {
            warn!(error = %e, "Failed to open PCM source");
            return Err(e);
        }

        *sampler = Some(self.spawn_sampler());
        info!(interval_ms = self.interval.as_millis() as u64, "Noise measurement started");
        Ok(())
    }

    async fn stop_measuring(&self) {
        let Some(task) = self.sampler.lock().await.take() else {
            return;
        };
        task.cancel();
        self.source.close().await;
        info!(average_db = *self.average_db.borrow(), "Noise measurement stopped");
    }

    async fn has_permission(&self) -> bool {
        self.source.has_permission()
    }

    async fn request_permission(&self) -> bool {
        self.source.request_permission()
    }
}
