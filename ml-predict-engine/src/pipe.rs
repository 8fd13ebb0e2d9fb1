//! Pipe engine: lazy row sequences with reuse and reset detection
//!
//! Every call to [`PipeEngine::run_pipe`] opens a fresh cursor and records the
//! engine's generation. [`PipeEngine::reset`] bumps the generation; a sequence
//! that is advanced after that fails with [`Error::StaleIteration`]. This is
//! detection of a caller ordering bug (pulling from an old sequence after the
//! source was replaced), not a synchronization mechanism.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use ml_predict_core::{DestinationRecord, Error, Result};

use crate::cursor::{CursorableAdapter, RowCursor};

/// Drives a [`CursorableAdapter`] into sequences of destination records
#[derive(Debug)]
pub struct PipeEngine<D> {
    adapter: CursorableAdapter<D>,
    generation: AtomicU64,
}

impl<D: DestinationRecord> PipeEngine<D> {
    /// Create an engine over an adapter
    pub fn new(adapter: CursorableAdapter<D>) -> Self {
        Self {
            adapter,
            generation: AtomicU64::new(0),
        }
    }

    /// The adapter rows are read through
    pub fn adapter(&self) -> &CursorableAdapter<D> {
        &self.adapter
    }

    /// Open a new sequence over the pipeline's current source contents
    ///
    /// With `reuse_row_object`, one destination instance is refilled in place
    /// for every row; otherwise each row gets a fresh instance.
    pub fn run_pipe(&self, reuse_row_object: bool) -> Result<PipeRows<'_, D>> {
        let started = self.generation();
        let cursor = self.adapter.get_cursor()?;
        Ok(PipeRows {
            cursor: Some(cursor),
            generation: &self.generation,
            started,
            reuse: reuse_row_object,
            current: None,
            yielded: 0,
        })
    }

    /// Invalidate every sequence created so far
    ///
    /// Open cursors are not closed here; a stale sequence notices on its next
    /// advance.
    pub fn reset(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "pipe engine reset");
        generation
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// A finite, single-pass sequence of destination records
///
/// [`advance`](PipeRows::advance) lends the current record until the next
/// advance, which is what makes in-place reuse safe. The [`Iterator`] impl
/// hands out owned records instead: moved out in allocate mode, cloned from
/// the shared instance in reuse mode.
pub struct PipeRows<'a, D> {
    cursor: Option<RowCursor<'a, D>>,
    generation: &'a AtomicU64,
    started: u64,
    reuse: bool,
    current: Option<D>,
    yielded: u64,
}

impl<D: DestinationRecord> PipeRows<'_, D> {
    /// Move to the next row and return it
    ///
    /// Returns `Ok(None)` once exhausted. After any error the sequence is
    /// finished and its cursor released.
    pub fn advance(&mut self) -> Result<Option<&D>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let current = self.generation.load(Ordering::Acquire);
        if current != self.started {
            warn!(
                started = self.started,
                current,
                yielded = self.yielded,
                "row sequence advanced after its engine was reset"
            );
            self.cursor = None;
            return Err(Error::StaleIteration {
                started: self.started,
                current,
            });
        }

        let filled = match cursor.move_next() {
            Ok(true) => match (self.reuse, self.current.as_mut()) {
                (true, Some(row)) => cursor.fill(row),
                _ => {
                    let mut row = D::default();
                    let filled = cursor.fill(&mut row);
                    self.current = Some(row);
                    filled
                }
            },
            Ok(false) => {
                self.cursor = None;
                return Ok(None);
            }
            Err(e) => Err(e),
        };

        if let Err(e) = filled {
            self.cursor = None;
            self.current = None;
            return Err(e);
        }

        self.yielded += 1;
        Ok(self.current.as_ref())
    }

    /// Move the last yielded record out of the sequence
    ///
    /// In reuse mode the next row is filled into a new instance.
    pub fn take_current(&mut self) -> Option<D> {
        self.current.take()
    }

    /// Whether this sequence refills a single instance
    pub fn is_reuse(&self) -> bool {
        self.reuse
    }

    /// Generation this sequence was created under
    pub fn started_generation(&self) -> u64 {
        self.started
    }

    /// Rows yielded so far
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Whether the sequence is finished (exhausted, failed or stale)
    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }
}

impl<D: DestinationRecord> Iterator for PipeRows<'_, D> {
    type Item = Result<D>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        }

        if self.reuse {
            self.current.clone().map(Ok)
        } else {
            self.current.take().map(Ok)
        }
    }
}
