//! Fixed-interval scan loop
//!
//! Each iteration captures a frame, runs detection and hands the result to
//! persistence, then sleeps for whatever is left of the interval. Capture,
//! detection and persistence failures are logged and never end the loop; only
//! a shutdown request does.

mod clock;
mod shutdown;

pub use clock::{Clock, TokioClock};
pub use shutdown::{escalate_interrupts, shutdown_channel, ShutdownHandle, ShutdownSignal};

use crate::capture::FrameSource;
use crate::persist::Persistence;
use anyhow::Result;
use log::{error, info, trace, warn};
use monscan_core::{MonsterSystemConfig, ScanStatistics};
use monscan_cv::traits::TemplateMatchable;
use monscan_cv::{DetectionResult, MonsterDetector};
use std::time::Duration;
use tokio::sync::watch;

/// Timing of the scan loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Target time between the starts of two iterations
    pub interval: Duration,
    /// Wait after a failed capture
    pub fallback_delay: Duration,
}

impl ScheduleConfig {
    pub fn from_system(config: &MonsterSystemConfig) -> Result<Self> {
        Ok(Self {
            interval: config.scan_interval()?,
            fallback_delay: config.fallback_delay()?,
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            fallback_delay: Duration::from_secs(10),
        }
    }
}

/// Phase of the scan loop, published to subscribers on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Capturing,
    Detecting,
    Persisting,
    Sleeping,
    Stopped,
}

/// Owns the collaborators and the scan counters for the whole run.
pub struct ScanScheduler<S, M, P, C = TokioClock> {
    source: S,
    detector: MonsterDetector<M>,
    sink: P,
    clock: C,
    config: ScheduleConfig,
    stats: ScanStatistics,
    state: watch::Sender<ScanState>,
}

impl<S, M, P> ScanScheduler<S, M, P, TokioClock>
where
    S: FrameSource,
    M: TemplateMatchable,
    P: Persistence,
{
    pub fn new(source: S, detector: MonsterDetector<M>, sink: P, config: ScheduleConfig) -> Self {
        Self {
            source,
            detector,
            sink,
            clock: TokioClock,
            config,
            stats: ScanStatistics::new(),
            state: watch::channel(ScanState::Idle).0,
        }
    }
}

impl<S, M, P, C> ScanScheduler<S, M, P, C>
where
    S: FrameSource,
    M: TemplateMatchable,
    P: Persistence,
    C: Clock,
{
    /// Swap the time source
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ScanScheduler<S, M, P, C2> {
        ScanScheduler {
            source: self.source,
            detector: self.detector,
            sink: self.sink,
            clock,
            config: self.config,
            stats: self.stats,
            state: self.state,
        }
    }

    /// Follow the loop's state; the last value seen after `run` returns is
    /// `Stopped`.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Scan until `shutdown` fires and return the final counters.
    ///
    /// Shutdown is honoured before each capture and during every sleep; an
    /// iteration that already has a frame runs to completion.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> ScanStatistics {
        info!(
            "Scanning every {:.1}s, press Ctrl+C to stop",
            self.config.interval.as_secs_f64()
        );

        loop {
            tokio::task::yield_now().await;
            if shutdown.is_triggered() {
                break;
            }

            let started = self.clock.now();
            self.transition(ScanState::Capturing);

            let Some(frame) = self.source.capture() else {
                warn!(
                    "Could not get screenshot, retrying in {:.1}s",
                    self.config.fallback_delay.as_secs_f64()
                );
                self.transition(ScanState::Sleeping);
                if !self.sleep(self.config.fallback_delay, &mut shutdown).await {
                    break;
                }
                continue;
            };
            self.stats.record_scan();

            self.transition(ScanState::Detecting);
            let result = match self.detector.detect(Some(&frame)) {
                Ok(result) => result,
                Err(e) => {
                    error!("Detection error: {:#}", e);
                    DetectionResult::empty()
                }
            };
            self.stats.record_detections(result.len());

            self.transition(ScanState::Persisting);
            if let Err(e) = self.sink.save(&frame, &result) {
                error!("Failed to save screenshot: {:#}", e);
            }

            info!(
                "Scan #{} completed - Detections: {} | Total detections saved: {}",
                self.stats.total_scans,
                result.len(),
                self.stats.detection_scans
            );

            let elapsed = self.clock.now().saturating_duration_since(started);
            let remaining = self.config.interval.saturating_sub(elapsed);
            if !remaining.is_zero() {
                self.transition(ScanState::Sleeping);
                info!("Waiting {:.1}s until next screenshot...", remaining.as_secs_f64());
                if !self.sleep(remaining, &mut shutdown).await {
                    break;
                }
            }
        }

        self.transition(ScanState::Stopped);
        self.stats
    }

    /// Sleep unless shutdown fires first; returns false when interrupted.
    async fn sleep(&self, duration: Duration, shutdown: &mut ShutdownSignal) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => false,
            _ = self.clock.sleep(duration) => true,
        }
    }

    fn transition(&self, next: ScanState) {
        let previous = self.state.send_replace(next);
        trace!("{:?} -> {:?}", previous, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use image::RgbImage;
    use monscan_core::Rgb;
    use monscan_cv::{BBox, BBoxCollection, Category, DetectionConfig, Frame, Template};
    use std::future::{ready, Future};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, OnceLock};
    use std::time::Instant;

    /// Manually advanced clock; sleeping just moves time forward.
    #[derive(Clone)]
    struct FakeClock(Arc<Mutex<Instant>>);

    impl FakeClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }

        fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
            self.advance(duration);
            ready(())
        }
    }

    /// Hands out frames (or failures) and stops the run after `limit` calls.
    struct ScriptedSource {
        clock: FakeClock,
        captures: Arc<Mutex<Vec<Instant>>>,
        fail_first: usize,
        limit: usize,
        stop: ShutdownHandle,
    }

    impl FrameSource for ScriptedSource {
        fn capture(&mut self) -> Option<Frame> {
            let mut captures = self.captures.lock().unwrap();
            captures.push(self.clock.now());
            if captures.len() >= self.limit {
                self.stop.trigger();
            }
            (captures.len() > self.fail_first).then(|| Frame::new(RgbImage::new(64, 64)))
        }
    }

    /// Takes `work` of clock time per call and reports a monster each time.
    struct SlowMatcher {
        clock: FakeClock,
        work: Duration,
        fail: bool,
    }

    impl TemplateMatchable for SlowMatcher {
        fn match_template(&self, _frame: &Frame, _template: &Template, _threshold: f64) -> Result<BBoxCollection> {
            self.clock.advance(self.work);
            if self.fail {
                bail!("matcher crashed");
            }
            Ok(BBoxCollection::from_vec(vec![
                BBox::new(4, 4, 8, 8, 0.9),
                BBox::new(4, 4, 8, 8, 0.9),
            ]))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        saved: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl Persistence for RecordingSink {
        fn save(&mut self, _frame: &Frame, result: &DetectionResult) -> Result<PathBuf> {
            self.saved.lock().unwrap().push(result.len());
            if self.fail {
                bail!("disk full");
            }
            Ok(PathBuf::from("shot.png"))
        }
    }

    struct Harness {
        clock: FakeClock,
        captures: Arc<Mutex<Vec<Instant>>>,
        saved: Arc<Mutex<Vec<usize>>>,
        signal: ShutdownSignal,
        scheduler: ScanScheduler<ScriptedSource, SlowMatcher, RecordingSink, FakeClock>,
    }

    fn harness(work: Duration, fail_first: usize, limit: usize) -> Harness {
        let clock = FakeClock::new();
        let (stop, signal) = shutdown_channel();
        let captures = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink::default();
        let saved = sink.saved.clone();

        let source = ScriptedSource {
            clock: clock.clone(),
            captures: captures.clone(),
            fail_first,
            limit,
            stop,
        };
        let category = Category::new("rats 1", "Rat 1", Rgb(255, 0, 0), 0.7)
            .with_templates(vec![Template::new("Rat 1_Left", RgbImage::new(8, 8))]);
        let matcher = SlowMatcher {
            clock: clock.clone(),
            work,
            fail: false,
        };
        let detector = MonsterDetector::new(DetectionConfig::default(), vec![category], matcher);

        let config = ScheduleConfig {
            interval: Duration::from_secs(10),
            fallback_delay: Duration::from_secs(3),
        };
        let scheduler = ScanScheduler::new(source, detector, sink, config).with_clock(clock.clone());

        Harness {
            clock,
            captures,
            saved,
            signal,
            scheduler,
        }
    }

    fn gaps(captures: &[Instant]) -> Vec<Duration> {
        captures.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test]
    async fn test_short_work_keeps_fixed_interval() {
        let h = harness(Duration::from_secs(3), 0, 4);

        let stats = h.scheduler.run(h.signal).await;

        assert_eq!(stats.total_scans, 4);
        assert_eq!(stats.detection_scans, 4);
        assert_eq!(gaps(&h.captures.lock().unwrap()), vec![Duration::from_secs(10); 3]);
        assert_eq!(*h.saved.lock().unwrap(), vec![1; 4]);
    }

    #[tokio::test]
    async fn test_long_work_runs_back_to_back() {
        let h = harness(Duration::from_secs(12), 0, 3);
        let started = h.clock.now();

        let stats = h.scheduler.run(h.signal).await;

        assert_eq!(stats.total_scans, 3);
        assert_eq!(gaps(&h.captures.lock().unwrap()), vec![Duration::from_secs(12); 2]);
        // No sleep after the last iteration either.
        assert_eq!(h.clock.now() - started, Duration::from_secs(36));
    }

    #[tokio::test]
    async fn test_capture_failures_wait_fallback_and_are_not_counted() {
        let h = harness(Duration::from_secs(1), 3, 5);

        let stats = h.scheduler.run(h.signal).await;

        // Three failures 3s apart, then two successes one interval apart.
        assert_eq!(stats.total_scans, 2);
        let secs: Vec<u64> = gaps(&h.captures.lock().unwrap()).iter().map(|g| g.as_secs()).collect();
        assert_eq!(secs, vec![3, 3, 3, 10]);
        assert_eq!(h.saved.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_only_failed_captures() {
        let h = harness(Duration::from_secs(1), 10, 3);

        let stats = h.scheduler.run(h.signal).await;

        assert_eq!(stats, ScanStatistics::default());
        assert_eq!(h.captures.lock().unwrap().len(), 3);
        assert!(h.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detection_failure_counts_as_empty_scan() {
        let mut h = harness(Duration::from_secs(1), 0, 2);
        h.scheduler.detector = MonsterDetector::new(
            DetectionConfig::default(),
            h.scheduler.detector.categories().to_vec(),
            SlowMatcher {
                clock: h.clock.clone(),
                work: Duration::from_secs(1),
                fail: true,
            },
        );

        let stats = h.scheduler.run(h.signal).await;

        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.detection_scans, 0);
        assert_eq!(*h.saved.lock().unwrap(), vec![0, 0]);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_stop_scanning() {
        let mut h = harness(Duration::from_secs(1), 0, 3);
        h.scheduler.sink.fail = true;

        let stats = h.scheduler.run(h.signal).await;

        assert_eq!(stats.total_scans, 3);
        assert_eq!(stats.detection_scans, 3);
        assert_eq!(h.saved.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_already_stopped_never_captures() {
        let h = harness(Duration::from_secs(1), 0, 1);
        let (stop, signal) = shutdown_channel();
        stop.trigger();

        let stats = h.scheduler.run(signal).await;

        assert_eq!(stats, ScanStatistics::default());
        assert!(h.captures.lock().unwrap().is_empty());
    }

    /// Real tokio timer with paused time: an interrupt arriving mid-sleep ends
    /// the run with the counters gathered so far.
    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_sleep() {
        let (stop, signal) = shutdown_channel();
        let saved = Arc::new(Mutex::new(Vec::new()));

        struct Frames;
        impl FrameSource for Frames {
            fn capture(&mut self) -> Option<Frame> {
                Some(Frame::new(RgbImage::new(32, 32)))
            }
        }

        struct Hits;
        impl TemplateMatchable for Hits {
            fn match_template(&self, _frame: &Frame, template: &Template, _threshold: f64) -> Result<BBoxCollection> {
                let (w, h) = (template.width() as i32, template.height() as i32);
                Ok(BBoxCollection::from_vec(vec![BBox::new(1, 1, w, h, 0.9), BBox::new(2, 1, w, h, 0.9)]))
            }
        }

        let category = Category::new("rats 1", "Rat 1", Rgb(255, 0, 0), 0.7)
            .with_templates(vec![Template::new("Rat 1_Left", RgbImage::new(8, 8))]);
        let detector = MonsterDetector::new(DetectionConfig::default(), vec![category], Hits);
        let sink = RecordingSink {
            saved: saved.clone(),
            fail: false,
        };
        let scheduler = ScanScheduler::new(Frames, detector, sink, ScheduleConfig::default());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            stop.trigger();
        });

        let started = tokio::time::Instant::now();
        let stats = scheduler.run(signal).await;

        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.detection_scans, 2);
        assert_eq!(saved.lock().unwrap().len(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    /// Each collaborator records the state it observes while being called.
    #[tokio::test]
    async fn test_state_follows_each_phase() {
        type Slot = Arc<OnceLock<watch::Receiver<ScanState>>>;

        fn seen(slot: &Slot, log: &Mutex<Vec<ScanState>>) {
            if let Some(rx) = slot.get() {
                log.lock().unwrap().push(*rx.borrow());
            }
        }

        struct Observed {
            slot: Slot,
            log: Arc<Mutex<Vec<ScanState>>>,
            stop: ShutdownHandle,
        }

        impl FrameSource for Observed {
            fn capture(&mut self) -> Option<Frame> {
                seen(&self.slot, &self.log);
                self.stop.trigger();
                Some(Frame::new(RgbImage::new(16, 16)))
            }
        }

        impl Persistence for Observed {
            fn save(&mut self, _frame: &Frame, _result: &DetectionResult) -> Result<PathBuf> {
                seen(&self.slot, &self.log);
                Ok(PathBuf::from("shot.png"))
            }
        }

        struct ObservedMatcher {
            slot: Slot,
            log: Arc<Mutex<Vec<ScanState>>>,
        }

        impl TemplateMatchable for ObservedMatcher {
            fn match_template(&self, _frame: &Frame, _template: &Template, _threshold: f64) -> Result<BBoxCollection> {
                seen(&self.slot, &self.log);
                Ok(BBoxCollection::new())
            }
        }

        let slot: Slot = Arc::new(OnceLock::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (stop, signal) = shutdown_channel();

        let category = Category::new("rats 1", "Rat 1", Rgb(255, 0, 0), 0.7)
            .with_templates(vec![Template::new("Rat 1_Left", RgbImage::new(8, 8))]);
        let matcher = ObservedMatcher {
            slot: slot.clone(),
            log: log.clone(),
        };
        let detector = MonsterDetector::new(DetectionConfig::default(), vec![category], matcher);
        let source = Observed {
            slot: slot.clone(),
            log: log.clone(),
            stop: stop.clone(),
        };
        let sink = Observed {
            slot: slot.clone(),
            log: log.clone(),
            stop,
        };

        let scheduler = ScanScheduler::new(source, detector, sink, ScheduleConfig::default()).with_clock(FakeClock::new());
        let mut state = scheduler.subscribe();
        assert_eq!(*state.borrow_and_update(), ScanState::Idle);
        assert!(slot.set(scheduler.subscribe()).is_ok());

        let stats = scheduler.run(signal).await;

        assert_eq!(stats.total_scans, 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![ScanState::Capturing, ScanState::Detecting, ScanState::Persisting]
        );
        assert_eq!(*state.borrow(), ScanState::Stopped);
    }
}
