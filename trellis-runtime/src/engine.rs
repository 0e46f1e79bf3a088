//! The reactive scheduler and STM substrate, fused into one `thread_local`
//! [`Engine`] instance per OS thread: a process-wide runtime addressed
//! through opaque symbols, intentionally `!Send + !Sync` since sharing one
//! engine across threads is out of scope.

use std::any::Any;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use scopeguard::{guard, ScopeGuard};

use crate::error::{ConflictError, TrellisError};
use crate::graph::ListenerGraph;
use crate::symbol::Symbol;

/// Observer cells are pinned to this pseudo-layer so they always drain after
/// every Computed cell, regardless of their nominal dependency depth.
pub const OBSERVER_LAYER: u32 = u32::MAX;

/// The closed set of cell kinds the scheduler does exhaustive case analysis
/// over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Value,
    Computed,
    Observer,
    Discrete,
    Sensor,
    Effector,
    Constant,
}

/// Flags a running rule can set about itself via `repeat`/`poll`/`mark_dirty`.
#[derive(Default, Clone, Copy)]
pub struct RunFlags {
    pub repeat_requested: bool,
    pub poll_requested: bool,
    pub force_changed: bool,
}

/// What a cell's recompute reports back to the scheduler, enough for it to
/// decide whether to commit, promote, or requeue.
pub struct RecomputeOutcome {
    /// Whether the committed value differs from the one before this
    /// recompute (by the cell's own equality semantics), or `false` when the
    /// recompute wasn't committed because of a layer promotion.
    pub changed: bool,
    /// `max(subject.layer) + 1`, computed from the subjects actually read
    /// this run.
    pub new_layer: u32,
    /// The subjects read this run, in discovery order.
    pub subjects: Vec<Symbol>,
    /// Whether the cell became a free-standing [`CellKind::Constant`] (no
    /// subjects were read and it isn't Observer/Discrete).
    pub became_constant: bool,
    pub flags: RunFlags,
}

/// The operations the scheduler needs from every cell, independent of its
/// value type. Implemented by the typed `Cell<T>` in the `trellis` crate.
pub trait ErasedCell {
    fn kind(&self) -> CellKind;

    /// Re-runs this cell's rule at most once. `known_layer` is this cell's
    /// currently recorded layer; implementations must not commit a new value
    /// if the freshly observed subjects would promote the layer above it —
    /// instead they report the higher `new_layer` with `changed: false` and
    /// rely on the scheduler to re-run them later, once subjects at that
    /// layer have themselves settled.
    fn recompute(&self, known_layer: u32) -> RecomputeOutcome;

    /// Snaps a [`CellKind::Discrete`] cell back to its default. Returns
    /// whether the value changed. Never called for other kinds.
    fn reset_to_default(&self) -> bool;

    /// Called once, when a recompute reported `became_constant`, so the
    /// typed cell can update its own notion of its kind.
    fn freeze_to_constant(&self) {}
}

/// A write queued by a rule, to be applied once that rule returns.
pub struct DeferredWrite {
    pub target: Symbol,
    pub apply: Box<dyn FnOnce()>,
}

/// An RAII-flavored resource tied to the lifetime of the current atomic
/// section.
pub trait ScopeManager {
    fn enter(&self);
    fn exit(&self, ok: bool);
}

/// The external-subscription half of a sensor: fired when its cell's
/// listener count crosses 0/nonzero, independent of whether the cell's own
/// value is ever recomputed. Implementations are type-erased over whatever
/// connection key they hand themselves (a subscription id, a socket, ...).
pub trait SensorHooks {
    /// Called once, the first time the sensor acquires a listener (or
    /// whenever called again after a matching `disconnect_if_needed`).
    fn connect_if_needed(&self);
    /// Called once the sensor's last listener drops.
    fn disconnect_if_needed(&self);
}

struct NodeMeta {
    kind: CellKind,
    layer: u32,
    version: u64,
    needs: u64,
    cell: Weak<dyn ErasedCell>,
}

struct Frame {
    symbol: Symbol,
    touched: Vec<Symbol>,
    flags: RunFlags,
}

struct EngineState {
    next_id: u64,
    version: u64,
    section_id: u64,
    section_depth: u32,
    in_cleanup: bool,

    nodes: HashMap<Symbol, NodeMeta>,
    graph: ListenerGraph,

    current: Vec<Frame>,
    ready: BinaryHeap<Reverse<(u32, u64, Symbol)>>,
    queued: HashSet<Symbol>,
    seq: u64,

    discrete_reset_queue: Vec<Symbol>,
    deferred_writes: Vec<DeferredWrite>,

    undo_log: Vec<Box<dyn FnOnce()>>,
    scope_managers: Vec<Rc<dyn ScopeManager>>,

    pollers: HashSet<Symbol>,

    convergence_budget: u32,
    times_seen: HashMap<Symbol, u32>,

    sensor_hooks: HashMap<Symbol, Rc<dyn SensorHooks>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            next_id: 0,
            version: 0,
            section_id: 0,
            section_depth: 0,
            in_cleanup: false,
            nodes: HashMap::new(),
            graph: ListenerGraph::new(),
            current: Vec::new(),
            ready: BinaryHeap::new(),
            queued: HashSet::new(),
            seq: 0,
            discrete_reset_queue: Vec::new(),
            deferred_writes: Vec::new(),
            undo_log: Vec::new(),
            scope_managers: Vec::new(),
            pollers: HashSet::new(),
            convergence_budget: 100,
            times_seen: HashMap::new(),
            sensor_hooks: HashMap::new(),
        }
    }
}

/// The engine: one per thread, holding the cell arena, the STM undo log and
/// the layered ready queue.
pub struct Engine {
    state: RefCell<EngineState>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(EngineState::new()),
        }
    }

    // ---- identity -----------------------------------------------------

    pub fn next_id(&self) -> Symbol {
        let mut s = self.state.borrow_mut();
        s.next_id += 1;
        Symbol::from_raw(s.next_id)
    }

    pub fn register(&self, id: Symbol, kind: CellKind, cell: Weak<dyn ErasedCell>) {
        let mut s = self.state.borrow_mut();
        let version = s.version;
        s.nodes.insert(
            id,
            NodeMeta {
                kind,
                layer: 0,
                version,
                needs: version,
                cell,
            },
        );
    }

    pub fn purge(&self, id: Symbol) {
        let affected_subjects = self.state.borrow().graph.iter_subjects_of(id).collect::<Vec<_>>();
        {
            let mut s = self.state.borrow_mut();
            s.nodes.remove(&id);
            s.graph.purge(id);
            s.pollers.remove(&id);
            s.queued.remove(&id);
            s.times_seen.remove(&id);
            s.sensor_hooks.remove(&id);
        }
        for subject in affected_subjects {
            self.sync_sensor_connection(subject);
        }
    }

    /// Registers `id`'s connect/disconnect lifecycle, invoked as its
    /// listener count crosses 0/nonzero. Replaces any hooks already
    /// registered for `id`.
    pub fn register_sensor_hooks(&self, id: Symbol, hooks: Rc<dyn SensorHooks>) {
        self.state.borrow_mut().sensor_hooks.insert(id, hooks);
    }

    /// Connects or disconnects `subject`'s registered hooks (if any) to
    /// match its current listener count. Safe to call redundantly; the
    /// hooks themselves track whether they're already connected.
    fn sync_sensor_connection(&self, subject: Symbol) {
        let hooks = self.state.borrow().sensor_hooks.get(&subject).cloned();
        if let Some(hooks) = hooks {
            let connected = self.state.borrow().graph.listener_count(subject) > 0;
            if connected {
                hooks.connect_if_needed();
            } else {
                hooks.disconnect_if_needed();
            }
        }
    }

    // ---- dependency graph ----------------------------------------------

    pub fn current_cell(&self) -> Option<Symbol> {
        self.state.borrow().current.last().map(|f| f.symbol)
    }

    pub fn in_rule(&self) -> bool {
        self.current_cell().is_some()
    }

    pub fn is_current(&self, id: Symbol) -> bool {
        self.current_cell() == Some(id)
    }

    pub fn in_cleanup(&self) -> bool {
        self.state.borrow().in_cleanup
    }

    /// Whether an atomic section is currently open, whether or not a rule
    /// is presently executing inside it.
    pub fn in_section(&self) -> bool {
        self.state.borrow().section_depth > 0
    }

    /// Runs `f` with `sym` pushed as the "currently computing" cell,
    /// returning its result along with every distinct subject `f` read
    /// (via nested [`Engine::record_dependency`] calls) and any
    /// `repeat`/`poll`/`mark_dirty` requests `f` made about itself.
    pub fn run_tracked<T>(&self, sym: Symbol, f: impl FnOnce() -> T) -> (T, Vec<Symbol>, RunFlags) {
        self.state.borrow_mut().current.push(Frame {
            symbol: sym,
            touched: Vec::new(),
            flags: RunFlags::default(),
        });
        // `f` may panic on its way out (a conflicting write aborts via
        // `panic_any`, and a user rule can panic outright); without this
        // guard the frame pushed above would be stranded on `current` and
        // misattribute later dependencies to this rule.
        let frame_guard = guard((), |()| {
            self.state.borrow_mut().current.pop();
        });
        let t = f();
        ScopeGuard::into_inner(frame_guard);
        let frame = self.state.borrow_mut().current.pop().expect("frame pushed above");
        debug_assert_eq!(frame.symbol, sym);
        (t, frame.touched, frame.flags)
    }

    /// Records `subject` as read by whichever cell is currently recomputing,
    /// if any. Self-reads are never recorded.
    pub fn record_dependency(&self, subject: Symbol) {
        let mut s = self.state.borrow_mut();
        if let Some(frame) = s.current.last_mut() {
            if frame.symbol != subject && !frame.touched.contains(&subject) {
                frame.touched.push(subject);
            }
        }
    }

    /// Requests that the currently executing rule be re-run again next
    /// sweep even if none of its subjects change.
    pub fn request_repeat(&self) {
        let mut s = self.state.borrow_mut();
        match s.current.last_mut() {
            Some(frame) => frame.flags.repeat_requested = true,
            None => {
                drop(s);
                panic_abort(TrellisError::Invalid(crate::error::InvalidOperation::NotInRule(
                    "repeat",
                )));
            }
        }
    }

    /// Registers the currently executing rule as a poller: it re-runs after
    /// every external write even when its own subjects didn't change.
    pub fn request_poll(&self) {
        let mut s = self.state.borrow_mut();
        match s.current.last_mut() {
            Some(frame) => frame.flags.poll_requested = true,
            None => {
                drop(s);
                panic_abort(TrellisError::Invalid(crate::error::InvalidOperation::NotInRule(
                    "poll",
                )));
            }
        }
    }

    /// Forces the currently executing rule's output to be treated as
    /// changed this run, regardless of what its equality check would say.
    pub fn request_mark_dirty(&self) {
        let mut s = self.state.borrow_mut();
        match s.current.last_mut() {
            Some(frame) => frame.flags.force_changed = true,
            None => {
                drop(s);
                panic_abort(TrellisError::Invalid(crate::error::InvalidOperation::NotInRule(
                    "mark_dirty",
                )));
            }
        }
    }

    /// Permanently freezes `id` as a [`CellKind::Constant`], independent of
    /// the automatic freeze a zero-subject recompute triggers.
    pub fn freeze(&self, id: Symbol) {
        let mut s = self.state.borrow_mut();
        if let Some(n) = s.nodes.get_mut(&id) {
            n.kind = CellKind::Constant;
        }
    }

    pub fn iter_subjects_of(&self, listener: Symbol) -> Vec<Symbol> {
        self.state.borrow().graph.iter_subjects_of(listener).collect()
    }

    pub fn iter_listeners_of(&self, subject: Symbol) -> Vec<Symbol> {
        self.state.borrow().graph.iter_listeners_of(subject).collect()
    }

    // ---- dirtiness ------------------------------------------------------

    pub fn is_dirty(&self, id: Symbol) -> bool {
        let s = self.state.borrow();
        s.nodes.get(&id).map(|n| n.needs > n.version).unwrap_or(false)
    }

    pub fn layer_of(&self, id: Symbol) -> u32 {
        self.state.borrow().nodes.get(&id).map(|n| n.layer).unwrap_or(0)
    }

    pub fn layer_for_subjects(&self, subjects: &[Symbol]) -> u32 {
        subjects.iter().map(|&s| self.layer_of(s)).max().map(|m| m + 1).unwrap_or(0)
    }

    /// Forces `id` to be scheduled even though no
    /// subject changed.
    pub fn ensure_recalc(&self, id: Symbol) {
        let version = self.bump_version();
        {
            let mut s = self.state.borrow_mut();
            if let Some(n) = s.nodes.get_mut(&id) {
                n.needs = version;
            }
        }
        self.freshen(id);
    }

    /// Ensures `id` is up to date, recursing through its (already fresher,
    /// lower-layer) subjects as its rule reads them. This is the pull-side of
    /// propagation used by plain reads; the push-side (the layered ready
    /// queue) additionally drives cells nobody happens to read, such as
    /// observers.
    pub fn freshen(&self, id: Symbol) {
        // A recompute that discovers a higher layer than expected retries
        // rather than committing (see `process_one`), leaving `id` dirty;
        // loop until it either settles or the convergence budget aborts it.
        while self.is_dirty(id) {
            self.process_one(id);
        }
    }

    // ---- write-time bookkeeping ------------------------------------------

    pub fn bump_version(&self) -> u64 {
        let mut s = self.state.borrow_mut();
        s.version += 1;
        s.version
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    pub fn current_section_id(&self) -> u64 {
        self.state.borrow().section_id
    }

    /// Marks every listener (and registered poller) of `id` as needing
    /// recomputation and schedules them.
    pub fn mark_dependents_stale_and_enqueue(&self, id: Symbol) {
        let version = self.version();
        // `iter_listeners_of` hands back reverse-of-subscription order; undo
        // that here so ties at the same layer break in subscription order,
        // matching the order dependents were first read in.
        let listeners: Vec<Symbol> = self.iter_listeners_of(id).into_iter().rev().collect();
        for l in listeners {
            {
                let mut s = self.state.borrow_mut();
                if let Some(n) = s.nodes.get_mut(&l) {
                    n.needs = n.needs.max(version);
                }
            }
            self.enqueue(l);
        }
        let pollers: Vec<Symbol> = self.state.borrow().pollers.iter().copied().collect();
        for poller in pollers {
            if poller != id {
                {
                    let mut s = self.state.borrow_mut();
                    if let Some(n) = s.nodes.get_mut(&poller) {
                        n.needs = n.needs.max(version);
                    }
                }
                self.enqueue(poller);
            }
        }
    }

    fn enqueue(&self, id: Symbol) {
        let mut s = self.state.borrow_mut();
        if s.queued.insert(id) {
            let layer = match s.nodes.get(&id) {
                Some(n) if n.kind == CellKind::Observer => OBSERVER_LAYER,
                Some(n) => n.layer,
                None => return,
            };
            s.seq += 1;
            let seq = s.seq;
            s.ready.push(Reverse((layer, seq, id)));
        }
    }

    fn pop_ready(&self) -> Option<Symbol> {
        let mut s = self.state.borrow_mut();
        s.ready.pop().map(|Reverse((_, _, id))| {
            s.queued.remove(&id);
            id
        })
    }

    pub fn queue_discrete_reset(&self, id: Symbol) {
        self.state.borrow_mut().discrete_reset_queue.push(id);
    }

    pub fn register_poller(&self, id: Symbol) {
        self.state.borrow_mut().pollers.insert(id);
    }

    pub fn unregister_poller(&self, id: Symbol) {
        self.state.borrow_mut().pollers.remove(&id);
    }

    pub fn set_convergence_budget(&self, budget: u32) {
        self.state.borrow_mut().convergence_budget = budget;
    }

    // ---- deferred writes --------------------------------------------------

    pub fn defer_write(&self, target: Symbol, apply: Box<dyn FnOnce()>) {
        self.state.borrow_mut().deferred_writes.push(DeferredWrite { target, apply });
    }

    // ---- STM: undo log, savepoints, scope managers ------------------------

    pub fn on_undo(&self, f: Box<dyn FnOnce()>) {
        self.state.borrow_mut().undo_log.push(f);
    }

    pub fn savepoint(&self) -> usize {
        self.state.borrow().undo_log.len()
    }

    pub fn rollback_to(&self, savepoint: usize) {
        loop {
            let entry = {
                let mut s = self.state.borrow_mut();
                if s.undo_log.len() <= savepoint {
                    break;
                }
                s.undo_log.pop()
            };
            if let Some(entry) = entry {
                if catch_unwind(AssertUnwindSafe(entry)).is_err() {
                    tracing::debug!("undo entry panicked; remaining entries are skipped");
                    break;
                }
            }
        }
        self.state.borrow_mut().undo_log.truncate(savepoint);
    }

    pub fn manage(&self, manager: Rc<dyn ScopeManager>) {
        if self.state.borrow().section_depth == 0 {
            panic_abort(TrellisError::Invalid(crate::error::InvalidOperation::ManageOutsideSection));
        }
        let already_registered = self
            .state
            .borrow()
            .scope_managers
            .iter()
            .any(|m| Rc::ptr_eq(m, &manager));
        if !already_registered {
            manager.enter();
            self.state.borrow_mut().scope_managers.push(manager);
        }
    }

    // ---- atomic sections ---------------------------------------------------

    /// Runs `f` in a new atomic section, or joins the currently open one.
    pub fn atomically<T>(&self, f: impl FnOnce() -> T) -> Result<T, TrellisError> {
        if self.state.borrow().section_depth > 0 {
            return Ok(f());
        }
        {
            let mut s = self.state.borrow_mut();
            s.section_depth = 1;
            s.section_id += 1;
        }
        tracing::debug!(section = self.current_section_id(), "opening atomic section");
        let result = catch_unwind(AssertUnwindSafe(|| {
            let t = f();
            self.drain_sweep();
            t
        }));
        let outcome = match result {
            Ok(t) => {
                self.commit();
                Ok(t)
            }
            Err(payload) => {
                let err = TrellisError::from_panic_payload(payload);
                self.abort(&err);
                Err(err)
            }
        };
        self.state.borrow_mut().section_depth = 0;
        outcome
    }

    fn commit(&self) {
        tracing::debug!(section = self.current_section_id(), "committing atomic section");
        self.state.borrow_mut().in_cleanup = true;
        let managers: Vec<_> = std::mem::take(&mut self.state.borrow_mut().scope_managers);
        for m in managers.into_iter().rev() {
            let _ = catch_unwind(AssertUnwindSafe(|| m.exit(true)));
        }
        self.state.borrow_mut().undo_log.clear();
        self.state.borrow_mut().times_seen.clear();
        self.state.borrow_mut().in_cleanup = false;
    }

    fn abort(&self, _err: &TrellisError) {
        tracing::debug!(section = self.current_section_id(), "aborting atomic section");
        self.state.borrow_mut().in_cleanup = true;
        self.rollback_to(0);
        let managers: Vec<_> = std::mem::take(&mut self.state.borrow_mut().scope_managers);
        for m in managers.into_iter().rev() {
            let _ = catch_unwind(AssertUnwindSafe(|| m.exit(false)));
        }
        self.state.borrow_mut().deferred_writes.clear();
        self.state.borrow_mut().ready.clear();
        self.state.borrow_mut().queued.clear();
        self.state.borrow_mut().discrete_reset_queue.clear();
        self.state.borrow_mut().times_seen.clear();
        self.state.borrow_mut().in_cleanup = false;
    }

    // ---- the scheduler itself ----------------------------------------------

    fn drain_sweep(&self) {
        loop {
            while let Some(sym) = self.pop_ready() {
                self.process_one(sym);
            }
            // A deferred write registered with no rule running (a
            // container mutated directly inside a bare `modifier`, say)
            // never passes through `process_one`'s own drain below, so it
            // needs a home here too.
            let deferred: Vec<DeferredWrite> = self.state.borrow_mut().deferred_writes.drain(..).collect();
            if !deferred.is_empty() {
                for dw in deferred {
                    (dw.apply)();
                }
                continue;
            }
            let resets: Vec<Symbol> = self.state.borrow_mut().discrete_reset_queue.drain(..).collect();
            if resets.is_empty() {
                break;
            }
            for sym in resets {
                self.perform_discrete_reset(sym);
            }
        }
    }

    fn process_one(&self, sym: Symbol) {
        let (cell, kind, old_layer) = {
            let s = self.state.borrow();
            match s.nodes.get(&sym) {
                Some(n) => match n.cell.upgrade() {
                    Some(cell) => (cell, n.kind, n.layer),
                    None => {
                        drop(s);
                        self.purge(sym);
                        return;
                    }
                },
                None => return,
            }
        };

        {
            let mut s = self.state.borrow_mut();
            let budget = s.convergence_budget;
            let count = s.times_seen.entry(sym).or_insert(0);
            *count += 1;
            if *count > budget {
                panic_abort(TrellisError::Conflict(ConflictError::Diverged { symbol: sym }));
            }
        }

        let outcome = cell.recompute(old_layer);

        let promoted = outcome.new_layer > old_layer;

        {
            let mut s = self.state.borrow_mut();
            let current_version = s.version;
            if let Some(n) = s.nodes.get_mut(&sym) {
                n.layer = outcome.new_layer;
                if !promoted {
                    n.version = current_version;
                }
            }
        }

        if promoted {
            tracing::trace!(
                symbol = ?sym,
                old_layer,
                new_layer = outcome.new_layer,
                "promoting cell layer; retrying after its new subjects settle"
            );
            self.enqueue(sym);
            return;
        }

        let prior_subjects = self.state.borrow().graph.iter_subjects_of(sym).collect::<Vec<_>>();
        self.state.borrow_mut().graph.set_subjects(sym, &outcome.subjects);
        let mut touched_subjects: HashSet<Symbol> = prior_subjects.into_iter().collect();
        touched_subjects.extend(outcome.subjects.iter().copied());
        for subject in touched_subjects {
            self.sync_sensor_connection(subject);
        }

        if outcome.became_constant {
            let mut s = self.state.borrow_mut();
            if let Some(n) = s.nodes.get_mut(&sym) {
                n.kind = CellKind::Constant;
            }
            drop(s);
            cell.freeze_to_constant();
        }

        let changed = outcome.changed || outcome.flags.force_changed;
        if changed {
            self.mark_dependents_stale_and_enqueue(sym);
            if kind == CellKind::Discrete {
                self.queue_discrete_reset(sym);
            }
        }
        if outcome.flags.poll_requested {
            self.register_poller(sym);
        }
        if outcome.flags.repeat_requested {
            self.enqueue(sym);
        }

        let deferred: Vec<DeferredWrite> = self.state.borrow_mut().deferred_writes.drain(..).collect();
        for dw in deferred {
            (dw.apply)();
        }
    }

    fn perform_discrete_reset(&self, sym: Symbol) {
        let cell = match self.state.borrow().nodes.get(&sym).and_then(|n| n.cell.upgrade()) {
            Some(cell) => cell,
            None => {
                self.purge(sym);
                return;
            }
        };
        let changed = cell.reset_to_default();
        if changed {
            self.bump_version();
            {
                let mut s = self.state.borrow_mut();
                let version = s.version;
                if let Some(n) = s.nodes.get_mut(&sym) {
                    n.version = version;
                }
            }
            self.mark_dependents_stale_and_enqueue(sym);
        }
    }

    /// Entry point used by external (non-rule) writes: bumps the version,
    /// marks `id`'s dependents stale and drives the whole graph to
    /// quiescence. Must be called from inside [`Engine::atomically`].
    pub fn propagate_external_write(&self, id: Symbol) {
        self.bump_version();
        let is_discrete = {
            let mut s = self.state.borrow_mut();
            let version = s.version;
            match s.nodes.get_mut(&id) {
                Some(n) => {
                    n.version = version;
                    n.kind == CellKind::Discrete
                }
                None => false,
            }
        };
        if is_discrete {
            self.queue_discrete_reset(id);
        }
        self.mark_dependents_stale_and_enqueue(id);
    }
}

fn panic_abort(err: TrellisError) -> ! {
    std::panic::panic_any(err)
}

/// Raises `err` as the current atomic section's outcome. Exposed so the
/// typed `trellis` crate can surface `ConflictError`/`ReadOnlyError` from
/// deep inside a rule without threading a `Result` through every signature.
pub fn abort_section(err: TrellisError) -> ! {
    panic_abort(err)
}

/// Helper for callers that need to assert a caught payload really is a
/// [`TrellisError`] (used by tests).
pub fn downcast_payload(payload: Box<dyn Any + Send>) -> TrellisError {
    TrellisError::from_panic_payload(payload)
}
