//! Minor collection driver.
//!
//! A minor collection moves every nursery object reachable from the roots or
//! from the tenured heap into the tenured heap, then resets the nursery.
//!
//! # Phases
//! 1. **Rooting**: join the background sweep, promote everything the roots
//!    reference, then consume the store buffer. If the store buffer
//!    overflowed, scan the whole tenured heap instead (see below).
//! 2. **Promoting**: trace the children of every tenured copy in FIFO order,
//!    promoting nursery children, until the worklist is empty.
//! 3. **Resizing**: grow or shrink the active chunk count from the promotion
//!    rate.
//! 4. **Sweeping**: free dead huge payloads, reset the bump pointer, clear
//!    the store buffer, and disable the nursery if the tenured heap passed its
//!    ceiling.
//!
//! # Store buffer overflow
//! Without a store buffer the collector does not know which tenured slots
//! point into the nursery. The fallback runs three passes: mark every nursery
//! object the tenured heap references, promote every marked object, then
//! rewrite every tenured pointer that still targets a forwarded cell.

use core_types::{CellPtr, GcError, GcResult, Value, ValueSlot};

use crate::config::{GROW_THRESHOLD, SHRINK_THRESHOLD};
use crate::context::GcContext;
use crate::promoter::MinorCollectionSession;
use crate::tenured::TenuredAllocator;
use crate::tracer::RootEnumerator;

/// State of the collection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPhase {
    /// No collection running
    Idle,
    /// Promoting roots and store buffer targets
    Rooting,
    /// Draining the fixup worklist
    Promoting,
    /// Adjusting the active chunk count
    Resizing,
    /// Resetting the nursery
    Sweeping,
}

/// Why a minor collection was requested.
///
/// The collector records the reason in its report but behaves the same for
/// all of them. `GcContext::pending_collection` suggests `OutOfNursery` or
/// `FullStoreBuffer`, and `GcContext::shutdown` collects with `Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcReason {
    /// A nursery allocation failed
    OutOfNursery,
    /// Requested by the embedding
    Explicit,
    /// The store buffer overflowed
    FullStoreBuffer,
    /// The runtime is shutting down
    Shutdown,
}

/// Outcome of one minor collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MinorGcReport {
    /// Why the collection ran
    pub reason: GcReason,
    /// Objects moved to the tenured heap
    pub objects_promoted: usize,
    /// Bytes that became resident in the tenured heap
    pub tenured_bytes: usize,
    /// Promoted bytes divided by nursery bytes in use
    pub promotion_rate: f64,
    /// Whether the store buffer had overflowed
    pub used_fallback: bool,
    /// Active chunk count when the collection started
    pub active_chunks_before: usize,
    /// Active chunk count after resizing, before any disabling
    pub active_chunks_after: usize,
    /// Whether the tenured ceiling disabled the nursery
    pub nursery_disabled: bool,
}

/// Cumulative statistics across collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NurseryStats {
    /// Collections that did work
    pub minor_collections: u64,
    /// Total objects promoted
    pub objects_promoted: u64,
    /// Total bytes promoted
    pub bytes_tenured: u64,
    /// Collections that ran the overflow fallback
    pub fallback_collections: u64,
    /// Collections that grew the nursery
    pub times_grown: u64,
    /// Collections that shrank the nursery
    pub times_shrunk: u64,
}

impl NurseryStats {
    fn record(&mut self, report: &MinorGcReport) {
        self.minor_collections += 1;
        self.objects_promoted += report.objects_promoted as u64;
        self.bytes_tenured += report.tenured_bytes as u64;
        if report.used_fallback {
            self.fallback_collections += 1;
        }
        if report.active_chunks_after > report.active_chunks_before {
            self.times_grown += 1;
        } else if report.active_chunks_after < report.active_chunks_before {
            self.times_shrunk += 1;
        }
    }
}

impl<A: TenuredAllocator> GcContext<A> {
    /// Runs a minor collection.
    ///
    /// Does nothing if the nursery is disabled or nothing was allocated since
    /// the last collection. Values reachable through `roots` are rewritten to
    /// point at the tenured copies.
    ///
    /// An error means the heap graph was found corrupt (for example a root
    /// naming a cell that does not exist). The context then stays in the
    /// failing phase and refuses further collections.
    ///
    /// # Arguments
    /// * `roots` - Root set of the mutator
    /// * `reason` - Why the collection runs
    ///
    /// # Returns
    /// The report of the collection, or `None` if there was nothing to do
    pub fn collect(
        &mut self,
        roots: &mut dyn RootEnumerator,
        reason: GcReason,
    ) -> GcResult<Option<MinorGcReport>> {
        if self.phase != CollectionPhase::Idle {
            return Err(GcError::CollectionInProgress);
        }
        if !self.nursery.is_enabled() || self.nursery.is_empty() {
            return Ok(None);
        }

        log::debug!(
            "minor gc ({:?}): {} bytes in {} active chunks",
            reason,
            self.nursery.used_bytes(),
            self.nursery.active_chunks()
        );

        let mut session = MinorCollectionSession::new();

        self.phase = CollectionPhase::Rooting;
        if self.background_sweep.wait() {
            log::debug!("joined background sweep");
        }
        self.fallback.clear();
        self.mark_roots(&mut session, roots)?;

        let used_fallback = self.store_buffer.has_overflowed();
        if used_fallback {
            self.collect_to_fixed_point_fallback(&mut session)?;
        } else {
            self.mark_store_buffer(&mut session)?;
        }

        self.phase = CollectionPhase::Promoting;
        self.collect_to_fixed_point(&mut session)?;

        self.phase = CollectionPhase::Resizing;
        let active_chunks_before = self.nursery.active_chunks();
        let promotion_rate = self.resize(&session);
        let active_chunks_after = self.nursery.active_chunks();

        self.phase = CollectionPhase::Sweeping;
        let nursery_disabled = self.sweep();
        self.nursery_exhausted = false;

        let report = MinorGcReport {
            reason,
            objects_promoted: session.promoted,
            tenured_bytes: session.tenured_size,
            promotion_rate,
            used_fallback,
            active_chunks_before,
            active_chunks_after,
            nursery_disabled,
        };
        self.stats.record(&report);
        self.phase = CollectionPhase::Idle;

        log::debug!(
            "minor gc done: promoted {} objects ({} bytes), rate {:.2}, {} -> {} chunks",
            report.objects_promoted,
            report.tenured_bytes,
            report.promotion_rate,
            report.active_chunks_before,
            report.active_chunks_after
        );
        Ok(Some(report))
    }

    fn mark_roots(
        &mut self,
        session: &mut MinorCollectionSession,
        roots: &mut dyn RootEnumerator,
    ) -> GcResult<()> {
        let mut result = Ok(());
        roots.trace_roots(&mut |value: &mut Value| {
            if result.is_ok() {
                result = self.update_or_move(session, None, value).map(|_| ());
            }
        });
        result
    }

    /// Reads the pointer at `slot`, promotes its target and writes the new
    /// address back.
    fn trace_slot(&mut self, session: &mut MinorCollectionSession, slot: ValueSlot) -> GcResult<()> {
        let mut value = self.read_slot(slot)?;
        if self.update_or_move(session, Some(slot), &mut value)? {
            self.store_slot(slot, value)?;
        }
        Ok(())
    }

    fn mark_store_buffer(&mut self, session: &mut MinorCollectionSession) -> GcResult<()> {
        let mut edges = Vec::with_capacity(self.store_buffer.len());
        self.store_buffer.mark(&mut |slot| edges.push(slot));

        for slot in edges {
            // A moved buffer leaves its old edges behind; the values were
            // recorded again under their new slots.
            if self.read_slot(slot).is_err() {
                log::trace!("skipping stale store buffer edge {:?}", slot);
                continue;
            }
            self.trace_slot(session, slot)?;
        }
        Ok(())
    }

    /// Traces the children of every tenured copy until no nursery pointers
    /// remain.
    fn collect_to_fixed_point(&mut self, session: &mut MinorCollectionSession) -> GcResult<()> {
        while let Some(addr) = session.fixups.pop_front() {
            for slot in self.child_slots(CellPtr::Tenured(addr))? {
                self.trace_slot(session, slot)?;
            }
        }
        Ok(())
    }

    /// Finds tenured-to-nursery edges by scanning the whole tenured heap.
    fn collect_to_fixed_point_fallback(
        &mut self,
        session: &mut MinorCollectionSession,
    ) -> GcResult<()> {
        log::debug!("store buffer overflowed; scanning the tenured heap");
        let cells = self.tenured.cells();

        // Mark reachable nursery objects without moving anything.
        for &addr in &cells {
            for slot in self.child_slots(CellPtr::Tenured(addr))? {
                if let Some(target) = self.read_slot(slot)?.as_nursery() {
                    if !self.nursery.is_inside(target) {
                        return Err(GcError::InvalidNurseryAddress(target));
                    }
                    if self.nursery.forwarded(target).is_none() {
                        self.fallback.set(target);
                    }
                }
            }
        }

        // Promote every marked object.
        for target in self.fallback.marked() {
            if self.nursery.forwarded(target).is_none() {
                self.move_to_tenured(session, target)?;
            }
        }

        // Redirect every pointer at a forwarded cell. Copies made above still
        // sit on the worklist and get their unforwarded children there.
        for addr in self.tenured.cells() {
            for slot in self.child_slots(CellPtr::Tenured(addr))? {
                let value = self.read_slot(slot)?;
                if let Some(dst) = value.as_nursery().and_then(|a| self.nursery.forwarded(a)) {
                    self.store_slot(slot, Value::Object(CellPtr::Tenured(dst)))?;
                }
            }
        }
        Ok(())
    }

    /// Applies the grow/shrink policy.
    ///
    /// # Returns
    /// The promotion rate of this collection
    fn resize(&mut self, session: &MinorCollectionSession) -> f64 {
        let used = self.nursery.used_bytes();
        let rate = if used == 0 {
            0.0
        } else {
            session.tenured_size as f64 / used as f64
        };

        if rate > GROW_THRESHOLD {
            self.nursery.grow_allocable_space();
            log::debug!(
                "promotion rate {:.2}: growing nursery to {} chunks",
                rate,
                self.nursery.active_chunks()
            );
        } else if rate < SHRINK_THRESHOLD {
            self.nursery.shrink_allocable_space();
            log::debug!(
                "promotion rate {:.2}: shrinking nursery to {} chunks",
                rate,
                self.nursery.active_chunks()
            );
        }
        rate
    }

    /// Resets the nursery after promotion.
    ///
    /// # Returns
    /// True if the nursery was disabled because the tenured heap is full
    fn sweep(&mut self) -> bool {
        let dead = self.huge_slots.drain();
        if !dead.is_empty() {
            log::trace!("freeing {} dead huge payloads", dead.len());
        }
        for addr in dead {
            self.malloc.free(addr);
        }

        self.nursery.sweep();
        self.store_buffer.clear();
        self.fallback.clear();

        let tenured_bytes = self.tenured.used_bytes();
        if tenured_bytes > self.config.max_tenured_bytes {
            log::warn!(
                "tenured heap at {} bytes exceeds {}; disabling nursery",
                tenured_bytes,
                self.config.max_tenured_bytes
            );
            self.nursery.disable();
            return true;
        }
        false
    }
}
