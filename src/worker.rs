//! Background batch processing with a pollable event queue.
//!
//! [`BatchWorker::spawn`] moves a batch onto its own thread, which drives
//! [`process_batch`] on a current-thread tokio runtime. The caller never
//! blocks on the network: it polls the queue with [`BatchWorker::try_next`]
//! (or [`BatchWorker::drain`]) on its own schedule, typically every
//! [`DEFAULT_POLL_INTERVAL`].
//!
//! Events arrive in input order. A file that fails, or whose provider
//! panics, produces [`WorkerEvent::Failed`] and the batch moves on; [`WorkerEvent::Finished`]
//! is always the last event.

use crate::error::InvoiceError;
use crate::output::ProcessedInvoice;
use crate::pipeline::input::file_name_of;
use crate::process::InvoiceProcessor;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// How often an interactive caller should poll the queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One message from the worker to the polling side.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A file went through the pipeline.
    Processed(Box<ProcessedInvoice>),
    /// A file could not be processed; the rest of the batch continues.
    Failed {
        file_name: String,
        path: PathBuf,
        error: InvoiceError,
    },
    /// The batch is done. Always the last event.
    Finished { processed: usize, failed: usize },
}

/// Process `paths` in order, reporting each outcome to `sink`, then
/// [`WorkerEvent::Finished`].
///
/// Each file runs as its own task, so a panic inside a provider is reported
/// as [`InvoiceError::Internal`] for that file and the batch continues.
pub async fn process_batch(
    processor: Arc<InvoiceProcessor>,
    paths: &[PathBuf],
    mut sink: impl FnMut(WorkerEvent),
) {
    let mut processed = 0;
    let mut failed = 0;

    for path in paths {
        let task = {
            let processor = Arc::clone(&processor);
            let path = path.clone();
            tokio::spawn(async move { processor.process(&path).await })
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("{}: processing task died: {}", path.display(), e);
                Err(InvoiceError::Internal(format!("processing panicked: {}", e)))
            }
        };

        match result {
            Ok(invoice) => {
                processed += 1;
                sink(WorkerEvent::Processed(Box::new(invoice)));
            }
            Err(e) => {
                failed += 1;
                warn!("{}: {}", path.display(), e);
                sink(WorkerEvent::Failed {
                    file_name: file_name_of(path),
                    path: path.clone(),
                    error: e,
                });
            }
        }
    }

    debug!("Batch done: {} processed, {} failed", processed, failed);
    sink(WorkerEvent::Finished { processed, failed });
}

/// Handle to a batch running on a background thread.
pub struct BatchWorker {
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
    processed: usize,
    failed: usize,
}

impl BatchWorker {
    /// Start processing `paths` on a new thread named `invoice-worker`.
    pub fn spawn(
        processor: Arc<InvoiceProcessor>,
        paths: Vec<PathBuf>,
    ) -> Result<Self, InvoiceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InvoiceError::Worker(format!("Failed to create tokio runtime: {}", e)))?;

        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("invoice-worker".to_string())
            .spawn(move || {
                runtime.block_on(process_batch(processor, &paths, |event| {
                    // The receiver is gone once the caller drops the worker.
                    let _ = tx.send(event);
                }));
            })
            .map_err(|e| InvoiceError::Worker(format!("Failed to spawn worker thread: {}", e)))?;

        Ok(Self {
            events: rx,
            handle: Some(handle),
            finished: false,
            processed: 0,
            failed: 0,
        })
    }

    /// Next queued event, without blocking.
    ///
    /// If the worker thread dies before reporting completion, a synthetic
    /// [`WorkerEvent::Finished`] with the counts seen so far is returned, so
    /// callers can rely on always receiving one.
    pub fn try_next(&mut self) -> Option<WorkerEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => {
                match &event {
                    WorkerEvent::Processed(_) => self.processed += 1,
                    WorkerEvent::Failed { .. } => self.failed += 1,
                    WorkerEvent::Finished { .. } => self.finished = true,
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                error!("Worker thread stopped without finishing the batch");
                self.finished = true;
                Some(WorkerEvent::Finished {
                    processed: self.processed,
                    failed: self.failed,
                })
            }
        }
    }

    /// Every event queued right now.
    pub fn drain(&mut self) -> Vec<WorkerEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next event, checking the queue every `interval`.
    /// Returns `None` once [`WorkerEvent::Finished`] has been delivered.
    pub fn poll(&mut self, interval: Duration) -> Option<WorkerEvent> {
        loop {
            if let Some(event) = self.try_next() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            thread::sleep(interval);
        }
    }

    /// True once [`WorkerEvent::Finished`] has been handed out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the worker thread to exit.
    pub fn join(mut self) -> Result<(), InvoiceError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| InvoiceError::Worker("worker thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::ProviderError;
    use crate::providers::{ExtractionProvider, OcrProvider};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Text;

    #[async_trait]
    impl OcrProvider for Text {
        fn name(&self) -> &str {
            "text"
        }
        async fn recognize(&self, _image: &DynamicImage) -> Result<String, ProviderError> {
            Ok("INVOICE NO 123 TOTAL DUE 45.00".to_string())
        }
    }

    struct Json;

    #[async_trait]
    impl ExtractionProvider for Json {
        fn name(&self) -> &str {
            "json"
        }
        async fn extract(&self, _text: &str) -> Result<String, ProviderError> {
            Ok(r#"{"invoice_number":"123"}"#.to_string())
        }
    }

    /// Panics on its first call, then behaves like [`Text`].
    struct PanicsOnce(AtomicUsize);

    #[async_trait]
    impl OcrProvider for PanicsOnce {
        fn name(&self) -> &str {
            "panics-once"
        }
        async fn recognize(&self, image: &DynamicImage) -> Result<String, ProviderError> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("decoder blew up");
            }
            Text.recognize(image).await
        }
    }

    fn processor_with(ocr: Arc<dyn OcrProvider>) -> Arc<InvoiceProcessor> {
        let config = PipelineConfig::builder()
            .ocr_provider(ocr)
            .extraction_provider(Arc::new(Json))
            .build()
            .unwrap();
        Arc::new(InvoiceProcessor::new(config).unwrap())
    }

    fn processor() -> Arc<InvoiceProcessor> {
        processor_with(Arc::new(Text))
    }

    fn white_png(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn failing_file_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = white_png(dir.path(), "good.png");
        let missing = dir.path().join("missing.png");

        let mut worker = BatchWorker::spawn(processor(), vec![missing, good]).unwrap();
        let mut events = Vec::new();
        while let Some(ev) = worker.poll(Duration::from_millis(5)) {
            events.push(ev);
        }
        assert!(worker.is_finished());
        worker.join().unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            WorkerEvent::Failed { file_name, error: InvoiceError::FileNotFound { .. }, .. }
                if file_name == "missing.png"
        ));
        match &events[1] {
            WorkerEvent::Processed(inv) => {
                assert_eq!(inv.file_name, "good.png");
                assert_eq!(inv.fields["invoice_number"], "123");
            }
            other => panic!("expected Processed, got {:?}", other),
        }
        assert!(matches!(
            events[2],
            WorkerEvent::Finished { processed: 1, failed: 1 }
        ));
    }

    #[test]
    fn provider_panic_fails_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = white_png(dir.path(), "first.png");
        let second = white_png(dir.path(), "second.png");

        let ocr = Arc::new(PanicsOnce(AtomicUsize::new(0)));
        let mut worker = BatchWorker::spawn(processor_with(ocr), vec![first, second]).unwrap();
        let mut events = Vec::new();
        while let Some(ev) = worker.poll(Duration::from_millis(5)) {
            events.push(ev);
        }
        worker.join().unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            WorkerEvent::Failed { file_name, error: InvoiceError::Internal(_), .. }
                if file_name == "first.png"
        ));
        match &events[1] {
            WorkerEvent::Processed(inv) => assert_eq!(inv.file_name, "second.png"),
            other => panic!("expected Processed, got {:?}", other),
        }
        assert!(matches!(
            events[2],
            WorkerEvent::Finished { processed: 1, failed: 1 }
        ));
    }

    #[test]
    fn empty_batch_only_finishes() {
        let mut worker = BatchWorker::spawn(processor(), Vec::new()).unwrap();
        let first = worker.poll(Duration::from_millis(5));
        assert!(matches!(
            first,
            Some(WorkerEvent::Finished { processed: 0, failed: 0 })
        ));
        assert!(worker.poll(Duration::from_millis(5)).is_none());
        assert!(worker.drain().is_empty());
    }
}
