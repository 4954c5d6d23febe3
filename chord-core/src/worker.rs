//! # Detection Worker
//!
//! Runs the detector on a dedicated thread fed through a bounded channel.
//!
//! ## Architecture
//! - **Caller**: submits `SpectrumFrame`s, typically once per analysis tick
//! - **Worker thread**: one pipeline pass per frame, results published in order
//! - **Communication**: crossbeam channels, with a separate shutdown channel
//!
//! A real-time caller uses [`DetectionWorker::submit`], which drops the frame
//! when the queue is full instead of letting work pile up. Offline callers
//! use [`DetectionWorker::submit_wait`] and [`DetectionWorker::finish`] so
//! that every frame is processed.

use crate::{ChordDetector, ChordResult};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use log::{debug, warn};
use serde::Deserialize;
use std::thread::{self, JoinHandle};

/// One spectrum snapshot with the metadata needed to interpret its bins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumFrame {
    pub bins: Vec<u8>,
    pub sample_rate: u32,
    pub fft_size: usize,
}

/// Handle to a running detection thread.
///
/// Dropping the handle signals shutdown and joins the thread.
#[derive(Debug)]
pub struct DetectionWorker {
    frame_tx: Option<Sender<SpectrumFrame>>,
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// Spawns the worker thread.
    ///
    /// # Arguments
    /// * `detector` - Detector run on every frame
    /// * `queue_capacity` - Frames that may wait before `submit` starts dropping
    ///
    /// # Returns
    /// * The worker handle and the receiver on which results are published
    pub fn spawn(detector: ChordDetector, queue_capacity: usize) -> Result<(Self, Receiver<ChordResult>)> {
        let (frame_tx, frame_rx) = bounded::<SpectrumFrame>(queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (result_tx, result_rx) = unbounded::<ChordResult>();

        let thread_handle = thread::Builder::new()
            .name("chord-detection".into())
            .spawn(move || run(detector, frame_rx, shutdown_rx, result_tx))
            .context("Failed to spawn detection thread")?;

        Ok((
            Self {
                frame_tx: Some(frame_tx),
                shutdown_tx,
                thread_handle: Some(thread_handle),
            },
            result_rx,
        ))
    }

    /// Queues a frame without blocking.
    ///
    /// # Returns
    /// * `true` if the frame was queued, `false` if it was dropped because the
    ///   queue is full or the worker has stopped
    pub fn submit(&self, frame: SpectrumFrame) -> bool {
        let Some(frame_tx) = &self.frame_tx else {
            return false;
        };
        match frame_tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Detection queue full, skipping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Queues a frame, waiting for room in the queue.
    ///
    /// # Returns
    /// * `false` if the worker has stopped
    pub fn submit_wait(&self, frame: SpectrumFrame) -> bool {
        self.frame_tx
            .as_ref()
            .is_some_and(|frame_tx| frame_tx.send(frame).is_ok())
    }

    /// Processes every queued frame, then stops the worker.
    pub fn finish(mut self) {
        self.frame_tx = None;
        self.join();
    }

    /// Stops the worker as soon as possible; queued frames may be discarded.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        self.frame_tx = None;
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Detection thread panicked");
            }
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    detector: ChordDetector,
    frame_rx: Receiver<SpectrumFrame>,
    shutdown_rx: Receiver<()>,
    result_tx: Sender<ChordResult>,
) {
    debug!("Detection thread started");
    loop {
        select! {
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => {
                    let result = detector.detect(&frame.bins, frame.sample_rate, frame.fft_size);
                    if result_tx.send(result).is_err() {
                        debug!("Result receiver dropped");
                        break;
                    }
                }
                Err(_) => {
                    debug!("Frame channel closed");
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                debug!("Received shutdown signal");
                break;
            },
        }
    }
    debug!("Detection thread finished");
}
