//! # The watch table: shared liveness state for every supervised worker.
//!
//! [`WatchTable`] is a fixed-capacity, slot-indexed arena of
//! [`WorkerSlot`]s. Slot indices are assigned at construction (config
//! order) and remain stable for the lifetime of the supervisor; a respawned
//! worker reuses its slot with a fresh pid and a bumped generation.
//!
//! ## Concurrency
//! Two tasks touch the table concurrently:
//! - the **heartbeat drain task** routes pulses via [`WatchTable::mark_alive`]
//!   (writes `alive` only);
//! - the **health-check loop** reads and clears `alive`, and rewrites `pid`
//!   and `generation` around respawns.
//!
//! All mutable state is atomic, so neither task ever holds a lock while the
//! other runs. `pid` is the routing key: a pulse is credited to a slot only
//! if the sender pid matches the slot's *current* pid, which makes queued
//! pulses from an already-replaced process self-discarding.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use nix::unistd::Pid;

use super::spec::WorkerSpec;

/// Maximum number of workers a single watch table can hold.
pub const MAX_WORKERS: usize = 4;

/// One watch-table entry: an immutable spec plus mutable liveness state.
///
/// Field semantics:
/// - `pid == 0` means the slot is vacant (no live process);
/// - `alive` is set by heartbeat pulses and cleared by the health check;
/// - `generation` counts respawns (0 = initial launch).
#[derive(Debug)]
pub struct WorkerSlot {
    spec: WorkerSpec,
    /// Current OS pid, 0 when vacant. Written only by the spawner/reaper.
    pid: AtomicI32,
    /// Pulse flag: set by the drain task, cleared by the health check.
    alive: AtomicBool,
    /// Respawn counter, bumped before each relaunch.
    generation: AtomicU32,
}

impl WorkerSlot {
    fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            pid: AtomicI32::new(0),
            alive: AtomicBool::new(false),
            generation: AtomicU32::new(0),
        }
    }

    /// Returns the immutable worker specification.
    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    /// Convenience: returns the worker name.
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Returns the current pid, or `None` if the slot is vacant.
    pub fn pid(&self) -> Option<Pid> {
        match self.pid.load(Ordering::Acquire) {
            0 => None,
            raw => Some(Pid::from_raw(raw)),
        }
    }

    /// Returns whether a pulse arrived since the last clear.
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns the current restart generation.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Records a (re)launch: new pid, presumed-alive grace, and the
    /// generation the launch belongs to.
    ///
    /// The grace `alive = true` means a fresh process is never judged hung
    /// before it had one full interval to pulse.
    pub(crate) fn record_spawn(&self, pid: Pid, respawn: bool) -> u32 {
        let generation = if respawn {
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.generation.load(Ordering::Acquire)
        };
        self.pid.store(pid.as_raw(), Ordering::Release);
        self.alive.store(true, Ordering::Release);
        generation
    }

    /// Clears the pulse flag at the start of a slot's verdict window.
    pub(crate) fn clear_alive(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Vacates the slot after its process has been collected.
    pub(crate) fn clear(&self) {
        self.pid.store(0, Ordering::Release);
        self.alive.store(false, Ordering::Release);
    }
}

/// Fixed-capacity table of worker slots, shared between the heartbeat
/// drain task and the health-check loop.
#[derive(Debug)]
pub struct WatchTable {
    slots: Box<[WorkerSlot]>,
}

impl WatchTable {
    /// Builds a table with one slot per spec, in order.
    ///
    /// # Panics
    /// Panics if more than [`MAX_WORKERS`] specs are given; configuration
    /// validation rejects such sets before a table is ever built.
    pub fn new(specs: &[WorkerSpec]) -> Self {
        assert!(
            specs.len() <= MAX_WORKERS,
            "watch table capacity is {MAX_WORKERS}, got {} specs",
            specs.len()
        );
        let slots = specs
            .iter()
            .cloned()
            .map(WorkerSlot::new)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when the table holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot at `index`.
    pub fn slot(&self, index: usize) -> &WorkerSlot {
        &self.slots[index]
    }

    /// Iterates slots with their stable indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &WorkerSlot)> {
        self.slots.iter().enumerate()
    }

    /// Routes a heartbeat pulse: sets `alive` on the slot whose *current*
    /// pid matches the sender, returning its index.
    ///
    /// Pulses from unknown pids (never supervised, or already replaced)
    /// return `None` and change nothing.
    pub fn mark_alive(&self, sender: Pid) -> Option<usize> {
        for (i, slot) in self.iter() {
            if slot.pid() == Some(sender) {
                slot.alive.store(true, Ordering::Release);
                return Some(i);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize) -> WatchTable {
        let specs: Vec<WorkerSpec> = (0..n)
            .map(|i| WorkerSpec::new(format!("w{i}"), "/bin/true", None))
            .collect();
        WatchTable::new(&specs)
    }

    #[test]
    fn test_new_slots_are_vacant() {
        let t = table(3);
        assert_eq!(t.len(), 3);
        for (_, slot) in t.iter() {
            assert!(slot.pid().is_none());
            assert!(!slot.alive());
            assert_eq!(slot.generation(), 0);
        }
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn test_over_capacity_panics() {
        table(MAX_WORKERS + 1);
    }

    #[test]
    fn test_record_spawn_sets_pid_grace_and_generation() {
        let t = table(1);
        let slot = t.slot(0);

        let gen0 = slot.record_spawn(Pid::from_raw(100), false);
        assert_eq!(gen0, 0);
        assert_eq!(slot.pid(), Some(Pid::from_raw(100)));
        assert!(slot.alive(), "fresh spawn gets one interval of grace");

        slot.clear_alive();
        let gen1 = slot.record_spawn(Pid::from_raw(101), true);
        assert_eq!(gen1, 1);
        assert_eq!(slot.pid(), Some(Pid::from_raw(101)));
        assert!(slot.alive());
    }

    #[test]
    fn test_mark_alive_routes_to_matching_slot() {
        let t = table(3);
        t.slot(0).record_spawn(Pid::from_raw(10), false);
        t.slot(1).record_spawn(Pid::from_raw(20), false);
        t.slot(2).record_spawn(Pid::from_raw(30), false);
        for (_, s) in t.iter() {
            s.clear_alive();
        }

        assert_eq!(t.mark_alive(Pid::from_raw(20)), Some(1));
        assert!(!t.slot(0).alive());
        assert!(t.slot(1).alive());
        assert!(!t.slot(2).alive());
    }

    #[test]
    fn test_mark_alive_ignores_unknown_pid() {
        let t = table(2);
        t.slot(0).record_spawn(Pid::from_raw(10), false);
        assert_eq!(t.mark_alive(Pid::from_raw(999)), None);
    }

    #[test]
    fn test_stale_pid_after_respawn_is_ignored() {
        let t = table(1);
        let slot = t.slot(0);
        slot.record_spawn(Pid::from_raw(50), false);
        slot.record_spawn(Pid::from_raw(51), true);
        slot.clear_alive();

        // A pulse queued by the replaced process must not be credited.
        assert_eq!(t.mark_alive(Pid::from_raw(50)), None);
        assert!(!slot.alive());
        assert_eq!(t.mark_alive(Pid::from_raw(51)), Some(0));
    }

    #[test]
    fn test_clear_vacates_slot() {
        let t = table(1);
        let slot = t.slot(0);
        slot.record_spawn(Pid::from_raw(77), false);
        slot.clear();
        assert!(slot.pid().is_none());
        assert!(!slot.alive());
        // A vacant slot matches no sender.
        assert_eq!(t.mark_alive(Pid::from_raw(77)), None);
    }
}
