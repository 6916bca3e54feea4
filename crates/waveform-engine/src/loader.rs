use crate::decoder::{AudioDecoder, WaveformError};
use crate::downsample::{channel_samples, downsample, normalize};
use log::{debug, warn};
use shared_types::PlayerSettings;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Full first-channel sample series, one value per frame.
pub fn load_samples<D: AudioDecoder + ?Sized>(
    decoder: &D,
    path: &Path,
) -> Result<Vec<f32>, WaveformError> {
    let audio = decoder.decode(path)?;
    if audio.channels == 0 {
        return Err(WaveformError::BufferRetrieveError);
    }
    Ok(channel_samples(&audio.samples, audio.channels as usize))
}

/// Normalized peak bars for a fixed-width waveform.
pub fn load_downsampled<D: AudioDecoder + ?Sized>(
    decoder: &D,
    path: &Path,
    bucket_count: usize,
) -> Result<Vec<f32>, WaveformError> {
    let samples = load_samples(decoder, path)?;
    Ok(normalize(&downsample(&samples, bucket_count)))
}

/// Waveform bars at the configured `downsample_count`.
pub fn load_waveform<D: AudioDecoder + ?Sized>(
    decoder: &D,
    path: &Path,
    settings: &PlayerSettings,
) -> Result<Vec<f32>, WaveformError> {
    load_downsampled(decoder, path, settings.downsample_count)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformRequest {
    pub request_id: u64,
    pub path: PathBuf,
    /// `None` loads the full series.
    pub bucket_count: Option<usize>,
}

#[derive(Debug)]
pub struct WaveformLoadResult {
    pub request_id: u64,
    pub path: PathBuf,
    pub result: Result<Vec<f32>, WaveformError>,
}

#[derive(Default)]
struct JobQueueState {
    pending: Option<WaveformRequest>,
    shutdown: bool,
}

/// Latest-only queue: a new request replaces one that has not started yet.
#[derive(Default)]
struct JobQueue {
    state: Mutex<JobQueueState>,
    ready: Condvar,
}

impl JobQueue {
    fn send(&self, job: WaveformRequest) -> Result<(), WaveformError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| WaveformError::LoaderStopped)?;
        if state.shutdown {
            return Err(WaveformError::LoaderStopped);
        }
        if let Some(replaced) = state.pending.replace(job) {
            debug!("dropping queued waveform request {}", replaced.request_id);
        }
        self.ready.notify_one();
        Ok(())
    }

    fn take_blocking(&self) -> Option<WaveformRequest> {
        let mut state = self.state.lock().ok()?;
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(job) = state.pending.take() {
                return Some(job);
            }
            state = self.ready.wait(state).ok()?;
        }
    }

    fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.shutdown = true;
            state.pending = None;
        }
        self.ready.notify_all();
    }
}

/// Background waveform loader where the most recent request wins.
///
/// Work for a superseded request is abandoned at the next checkpoint and its
/// result is never delivered.
pub struct WaveformLoader {
    queue: Arc<JobQueue>,
    latest: Arc<AtomicU64>,
    results: Receiver<WaveformLoadResult>,
    worker: Option<JoinHandle<()>>,
}

impl WaveformLoader {
    pub fn spawn<D: AudioDecoder>(decoder: D) -> Self {
        let queue = Arc::new(JobQueue::default());
        let latest = Arc::new(AtomicU64::new(0));
        let (result_tx, results) = mpsc::channel();

        let worker = {
            let queue = Arc::clone(&queue);
            let latest = Arc::clone(&latest);
            thread::spawn(move || run_worker(decoder, &queue, &latest, &result_tx))
        };

        Self {
            queue,
            latest,
            results,
            worker: Some(worker),
        }
    }

    /// Queues a load and returns its id. Any older request is superseded.
    pub fn request(
        &self,
        path: impl Into<PathBuf>,
        bucket_count: Option<usize>,
    ) -> Result<u64, WaveformError> {
        let request_id = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        self.queue.send(WaveformRequest {
            request_id,
            path: path.into(),
            bucket_count,
        })?;
        Ok(request_id)
    }

    /// Queues a bar load sized by `settings.downsample_count`.
    pub fn request_waveform(
        &self,
        path: impl Into<PathBuf>,
        settings: &PlayerSettings,
    ) -> Result<u64, WaveformError> {
        self.request(path, Some(settings.downsample_count))
    }

    pub fn latest_request(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    pub fn is_current(&self, request_id: u64) -> bool {
        request_id == self.latest_request()
    }

    /// Next result for the most recent request, skipping any stale ones.
    pub fn recv(&self) -> Result<WaveformLoadResult, WaveformError> {
        loop {
            let result = self
                .results
                .recv()
                .map_err(|_| WaveformError::LoaderStopped)?;
            if self.is_current(result.request_id) {
                return Ok(result);
            }
        }
    }

    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Option<WaveformLoadResult>, WaveformError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) if self.is_current(result.request_id) => return Ok(Some(result)),
                Ok(_) => continue,
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(WaveformError::LoaderStopped)
                }
            }
        }
    }

    pub fn try_recv(&self) -> Option<WaveformLoadResult> {
        while let Ok(result) = self.results.try_recv() {
            if self.is_current(result.request_id) {
                return Some(result);
            }
        }
        None
    }
}

impl Drop for WaveformLoader {
    fn drop(&mut self) {
        self.queue.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("waveform loader worker panicked");
            }
        }
    }
}

fn run_worker<D: AudioDecoder>(
    decoder: D,
    queue: &JobQueue,
    latest: &AtomicU64,
    results: &Sender<WaveformLoadResult>,
) {
    let superseded = |request_id: u64| latest.load(Ordering::Acquire) != request_id;

    while let Some(job) = queue.take_blocking() {
        if superseded(job.request_id) {
            continue;
        }
        debug!(
            "loading waveform {} for {}",
            job.request_id,
            job.path.display()
        );

        let result = load_samples(&decoder, &job.path).map(|samples| match job.bucket_count {
            Some(bucket_count) if !superseded(job.request_id) => {
                normalize(&downsample(&samples, bucket_count))
            }
            _ => samples,
        });

        if superseded(job.request_id) {
            debug!("discarding superseded waveform {}", job.request_id);
            continue;
        }
        if let Err(err) = result.as_ref() {
            warn!("waveform load failed for {}: {err}", job.path.display());
        }
        let delivered = results.send(WaveformLoadResult {
            request_id: job.request_id,
            path: job.path,
            result,
        });
        if delivered.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{load_downsampled, load_samples, load_waveform, WaveformLoader};
    use crate::decoder::tests::write_wav_i16;
    use crate::decoder::{AudioDecoder, WavDecoder, WaveformError};
    use approx::assert_relative_eq;
    use shared_types::{DecodedAudio, PlayerSettings};
    use std::path::Path;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Blocks decoding of "slow" paths until the test releases it.
    struct GatedDecoder {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl AudioDecoder for GatedDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedAudio, WaveformError> {
            if path.ends_with("slow.wav") {
                if let Ok(gate) = self.gate.lock() {
                    let _ = gate.recv_timeout(Duration::from_secs(5));
                }
            }
            if path.ends_with("missing.wav") {
                return Err(WaveformError::AudioFileNotFound(path.display().to_string()));
            }
            Ok(DecodedAudio::new(8_000, 1, vec![1.0, 2.0, 4.0, 8.0]))
        }
    }

    struct ChannelLessDecoder;

    impl AudioDecoder for ChannelLessDecoder {
        fn decode(&self, _path: &Path) -> Result<DecodedAudio, WaveformError> {
            Ok(DecodedAudio::new(44_100, 0, Vec::new()))
        }
    }

    #[test]
    fn load_samples_rejects_audio_without_channels() {
        let result = load_samples(&ChannelLessDecoder, Path::new("empty.wav"));
        assert!(matches!(result, Err(WaveformError::BufferRetrieveError)));
    }

    #[test]
    fn load_waveform_uses_configured_bucket_count() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let samples: Vec<i16> = (0..100).map(|i| i as i16 * 100).collect();
        let path = write_wav_i16(dir.path(), "bars.wav", 1, &samples);
        let settings = PlayerSettings {
            downsample_count: 5,
            ..PlayerSettings::default()
        };

        let bars = load_waveform(&WavDecoder, &path, &settings).expect("load bars");
        assert_eq!(bars.len(), 5);
        assert_relative_eq!(bars[4], 1.0);
    }

    #[test]
    fn loader_requests_default_bar_count() {
        let loader = WaveformLoader::spawn(WavDecoder);
        let dir = tempfile::tempdir().expect("create tempdir");
        let samples: Vec<i16> = (0..400).map(|i| i as i16 * 10).collect();
        let path = write_wav_i16(dir.path(), "default.wav", 1, &samples);

        let id = loader
            .request_waveform(&path, &PlayerSettings::default())
            .expect("request");
        let result = loader.recv().expect("result");
        assert_eq!(result.request_id, id);
        assert_eq!(result.result.expect("bars").len(), 20);
    }

    #[test]
    fn load_samples_reads_first_channel() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_wav_i16(dir.path(), "stereo.wav", 2, &[8_192, 100, -16_384, 100]);

        let samples = load_samples(&WavDecoder, &path).expect("load samples");
        assert_eq!(samples.len(), 2);
        assert_relative_eq!(samples[0], 0.25);
        assert_relative_eq!(samples[1], -0.5);
    }

    #[test]
    fn load_downsampled_normalizes_bars() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let samples: Vec<i16> = (0..400).map(|i| (i % 100) as i16 * 100).collect();
        let path = write_wav_i16(dir.path(), "mono.wav", 1, &samples);

        let bars = load_downsampled(&WavDecoder, &path, 4).expect("load bars");
        assert_eq!(bars.len(), 4);
        for bar in bars {
            assert_relative_eq!(bar, 1.0);
        }
    }

    #[test]
    fn loader_delivers_latest_result() {
        let loader = WaveformLoader::spawn(WavDecoder);
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = write_wav_i16(dir.path(), "a.wav", 1, &[1_000, 2_000, 4_000, 8_000]);

        let id = loader.request(&path, Some(2)).expect("request");
        let result = loader.recv().expect("result");
        assert_eq!(result.request_id, id);
        let bars = result.result.expect("bars");
        assert_relative_eq!(bars[0], 0.25);
        assert_relative_eq!(bars[1], 1.0);
    }

    #[test]
    fn loader_surfaces_missing_files() {
        let loader = WaveformLoader::spawn(WavDecoder);
        let dir = tempfile::tempdir().expect("create tempdir");
        loader
            .request(dir.path().join("missing.wav"), None)
            .expect("request");

        let result = loader.recv().expect("result");
        assert!(matches!(
            result.result,
            Err(WaveformError::AudioFileNotFound(_))
        ));
    }

    #[test]
    fn superseded_request_is_never_delivered() {
        let (release, gate) = mpsc::channel();
        let loader = WaveformLoader::spawn(GatedDecoder {
            gate: Mutex::new(gate),
        });

        let stale = loader.request("slow.wav", Some(2)).expect("first request");
        // Give the worker time to pick up the slow job before superseding it.
        std::thread::sleep(Duration::from_millis(50));
        let fresh = loader.request("fast.wav", None).expect("second request");
        assert!(!loader.is_current(stale));
        release.send(()).expect("release gate");

        let result = loader
            .recv_timeout(Duration::from_secs(5))
            .expect("loader running")
            .expect("fresh result");
        assert_eq!(result.request_id, fresh);
        assert_eq!(result.result.expect("samples"), vec![1.0, 2.0, 4.0, 8.0]);
        assert!(loader.try_recv().is_none());
    }

    #[test]
    fn queued_requests_collapse_to_the_newest() {
        let (release, gate) = mpsc::channel();
        let loader = WaveformLoader::spawn(GatedDecoder {
            gate: Mutex::new(gate),
        });

        loader.request("slow.wav", None).expect("busy request");
        std::thread::sleep(Duration::from_millis(50));
        loader.request("missing.wav", None).expect("queued request");
        let last = loader.request("fast.wav", Some(4)).expect("last request");
        release.send(()).expect("release gate");

        let result = loader.recv().expect("result");
        assert_eq!(result.request_id, last);
        assert_eq!(result.result.expect("bars"), vec![0.125, 0.25, 0.5, 1.0]);
    }
}
