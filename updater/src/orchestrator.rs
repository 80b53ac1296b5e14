//! Update Orchestrator
//!
//! Drives an in-place update from request to handoff, and picks the state
//! back up in the new image.
//!
//! # Sequence
//!
//! ```text
//!  request_update()                     run_pending()  (deferred task)
//!  ────────────────                     ──────────────────────────────
//!  Idle                                 ShutdownComplete ──retry──┐
//!   │ in progress? fuse? region?         │                ◀───────┘
//!   ▼                                    ▼
//!  CompatibilityCheck                   DataBackup       store_all()
//!   │                                    ▼
//!   ▼                                   WatchdogQuiesce  kick or stop
//!  ShutdownInitiate ──fail──▶ abort      ▼
//!   │                                   Relocate         ack, Idle, jump
//!   ▼                                    ▼
//!  InProgress, task queued              (new image) resume()  restore_all()
//! ```
//!
//! Everything up to and including ShutdownInitiate happens in the
//! requester's context and is undone on failure. From ShutdownComplete on
//! the work runs as a queued task and the requester is told the outcome
//! through its [`Acknowledge`] handle. After relocation nothing in this
//! image runs again.

use alloc::boxed::Box;

use log::{debug, error, info, warn};
use plm_hwinit::{Memory, Mmio};
use plm_persistent::{
    restore_all, store_all, BackupRegion, DataStructureRegistry, DsDescriptor, ModuleId,
    RestoreReport,
};

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::gate::{update_disabled, AcceptAll, CompatibilityGate};
use crate::handoff::{request_service, HandoffChannel, RomService};
use crate::module::{CompletePass, ModuleShutdownState, ModuleTable, Shutdownable};
use crate::request::{Acknowledge, CandidateImage, UpdateRequest};
use crate::scheduler::TaskQueue;
use crate::state::{UpdateFlag, UpdateState};
use crate::watchdog::{quiesce_watchdog, ErrorActions, Watchdog};

/// Step the orchestrator is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    CompatibilityCheck,
    ShutdownInitiate,
    ShutdownComplete,
    DataBackup,
    WatchdogQuiesce,
    Relocate,
}

/// Deferred work queued by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTask {
    /// Confirm module shutdown and carry on to the handoff
    CompleteShutdown,
}

/// An accepted request waiting for its deferred task.
struct Pending {
    image: CandidateImage,
    region: BackupRegion,
    requester: Option<Box<dyn Acknowledge>>,
}

/// All update state of one firmware image.
pub struct UpdateContext<R: Mmio, M: Memory, H: HandoffChannel> {
    config: UpdateConfig,
    regs: R,
    mem: M,
    handoff: H,
    gate: Box<dyn CompatibilityGate>,
    watchdog: Option<Box<dyn Watchdog>>,
    error_actions: Option<Box<dyn ErrorActions>>,
    modules: ModuleTable,
    registry: DataStructureRegistry,
    state: UpdateFlag,
    phase: UpdatePhase,
    tasks: TaskQueue<UpdateTask>,
    pending: Option<Pending>,
}

impl<R: Mmio, M: Memory, H: HandoffChannel> UpdateContext<R, M, H> {
    /// Context with no modules, no structures and a gate that accepts
    /// every image.
    pub fn new(config: UpdateConfig, regs: R, mem: M, handoff: H) -> Self {
        Self {
            config,
            regs,
            mem,
            handoff,
            gate: Box::new(AcceptAll),
            watchdog: None,
            error_actions: None,
            modules: ModuleTable::new(),
            registry: DataStructureRegistry::new(),
            state: UpdateFlag::new(),
            phase: UpdatePhase::Idle,
            tasks: TaskQueue::new(),
            pending: None,
        }
    }

    /// Check candidate images with `gate`.
    pub fn with_gate<G: CompatibilityGate + 'static>(mut self, gate: G) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn with_watchdog<W: Watchdog + 'static>(mut self, watchdog: W) -> Self {
        self.watchdog = Some(Box::new(watchdog));
        self
    }

    pub fn with_error_actions<E: ErrorActions + 'static>(mut self, actions: E) -> Self {
        self.error_actions = Some(Box::new(actions));
        self
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REGISTRATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a module. `None` means it has nothing to drain.
    pub fn register_module(
        &mut self,
        id: ModuleId,
        handler: Option<Box<dyn Shutdownable>>,
    ) -> Result<()> {
        self.modules.register(id, handler)
    }

    /// Register a data structure to carry across updates.
    pub fn register_ds(&mut self, desc: DsDescriptor) -> Result<()> {
        self.registry
            .register(desc)
            .map_err(UpdateError::Registration)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> UpdateState {
        self.state.get()
    }

    /// Shared handle for readers in other contexts.
    pub fn state_flag(&self) -> &UpdateFlag {
        &self.state
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn module_state(&self, id: ModuleId) -> Option<ModuleShutdownState> {
        self.modules.state(id)
    }

    pub fn registry(&self) -> &DataStructureRegistry {
        &self.registry
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn mem(&self) -> &M {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn handoff(&self) -> &H {
        &self.handoff
    }

    pub fn tasks(&self) -> &TaskQueue<UpdateTask> {
        &self.tasks
    }

    /// Tear the context down, handing back the hardware it owned.
    pub fn into_parts(self) -> (R, M, H) {
        (self.regs, self.mem, self.handoff)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REQUEST
    // ═══════════════════════════════════════════════════════════════════════

    /// Accept or reject an update request.
    ///
    /// On `Ok` the modules are shutting down, the state is `InProgress`
    /// and the rest runs from [`run_pending`](Self::run_pending); the
    /// requester hears the outcome exactly once. On `Err` nothing has
    /// changed and the requester is not called.
    pub fn request_update(&mut self, request: UpdateRequest) -> Result<()> {
        let UpdateRequest { source, requester } = request;
        let map = self.config.regs;

        if self.state.is_in_progress() || self.pending.is_some() {
            warn!("update request rejected: already in progress");
            return Err(UpdateError::InProgress);
        }
        if update_disabled(&self.regs, &map) {
            warn!("update request rejected: disabled by fuse");
            return Err(UpdateError::Disabled);
        }

        let region = BackupRegion::load(&self.regs, map.rsvd_ddr_addr, map.rsvd_ddr_size)
            .ok_or(UpdateError::InvalidRegion)?;
        let needed = self.registry.serialized_size();
        if !region.can_hold(needed) {
            return Err(UpdateError::InsufficientRegion {
                needed,
                capacity: region.size(),
            });
        }

        let image = source.resolve(&self.regs, &map)?;

        // Claimed before any module hears of the update
        let Some(prior) = self.state.try_begin() else {
            return Err(UpdateError::InProgress);
        };

        self.phase = UpdatePhase::CompatibilityCheck;
        if let Err(e) = self.gate.check(&image, &self.mem) {
            warn!("candidate image at {:#x} rejected: {}", image.addr, e);
            self.state.set(prior);
            self.phase = UpdatePhase::Idle;
            return Err(e.into());
        }

        self.phase = UpdatePhase::ShutdownInitiate;
        if let Err(module) = self.modules.initiate_all() {
            self.state.set(prior);
            self.phase = UpdatePhase::Idle;
            return Err(UpdateError::ShutdownInitiate { module });
        }

        info!(
            "update accepted: image {:#x}, backup {} of {} bytes",
            image.addr,
            needed,
            region.size()
        );
        self.pending = Some(Pending {
            image,
            region,
            requester,
        });
        self.phase = UpdatePhase::ShutdownComplete;
        self.tasks.push(UpdateTask::CompleteShutdown, 0);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DEFERRED WORK
    // ═══════════════════════════════════════════════════════════════════════

    /// Let `ticks` scheduler ticks pass.
    pub fn tick(&mut self, ticks: u32) {
        self.tasks.advance(ticks);
    }

    /// Run every task that is due. Returns how many ran.
    ///
    /// Does not return if a task reaches the handoff.
    pub fn run_pending(&mut self) -> Result<usize> {
        let mut ran = 0;
        while let Some(task) = self.tasks.pop_due() {
            ran += 1;
            self.run_task(task)?;
        }
        Ok(ran)
    }

    pub fn run_task(&mut self, task: UpdateTask) -> Result<()> {
        match task {
            UpdateTask::CompleteShutdown => self.complete_shutdown(),
        }
    }

    fn complete_shutdown(&mut self) -> Result<()> {
        let Some(region) = self.pending.as_ref().map(|p| p.region) else {
            return Err(UpdateError::TaskNotFound);
        };

        match self.modules.complete_all() {
            CompletePass::Done => {}
            CompletePass::RetryLater(module) => {
                debug!("module {} still draining, retrying", module);
                let delay = self.config.retry_delay_ticks.max(1);
                self.tasks.push(UpdateTask::CompleteShutdown, delay);
                return Ok(());
            }
            CompletePass::Failed(module, code) => {
                return self.fail(UpdateError::ShutdownComplete { module, code });
            }
        }

        self.phase = UpdatePhase::DataBackup;
        if let Err(e) = store_all(&self.registry, &mut self.mem, region) {
            return self.fail(UpdateError::Backup(e));
        }

        self.phase = UpdatePhase::WatchdogQuiesce;
        if let Some(actions) = self.error_actions.as_mut() {
            actions.quiesce();
        }
        if let Some(watchdog) = self.watchdog.as_mut() {
            if quiesce_watchdog(watchdog.as_mut(), self.config.watchdog).is_err() {
                // This image keeps running, so its error actions must too
                if let Some(actions) = self.error_actions.as_mut() {
                    actions.restore();
                }
                return self.fail(UpdateError::Watchdog);
            }
        }

        match self.pending.take() {
            Some(pending) => self.relocate(pending),
            None => Err(UpdateError::TaskNotFound),
        }
    }

    /// Point of no return.
    fn relocate(&mut self, pending: Pending) -> ! {
        self.phase = UpdatePhase::Relocate;
        if let Some(mut requester) = pending.requester {
            requester.acknowledge(Ok(()));
        }

        info!("handing off to image at {:#x}", pending.image.addr);
        self.state.set(UpdateState::Idle);
        self.handoff.relocate_and_jump(pending.image.addr)
    }

    /// Give up on the pending update and tell the requester.
    fn fail(&mut self, err: UpdateError) -> Result<()> {
        error!("update failed in {:?}: {} ({:#x})", self.phase, err, err.code());
        self.state.set(UpdateState::Idle);
        self.phase = UpdatePhase::Idle;
        if let Some(mut requester) = self.pending.take().and_then(|p| p.requester) {
            requester.acknowledge(Err(err));
        }
        Err(err)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // NEW IMAGE
    // ═══════════════════════════════════════════════════════════════════════

    /// Start-up hook of the new image. Call once every module and data
    /// structure is registered.
    ///
    /// Returns `None` on an ordinary boot. After an update it marks the
    /// state `Done`, restores every structure from the backup region and
    /// re-arms the watchdog.
    pub fn resume(&mut self) -> Result<Option<RestoreReport>> {
        let map = self.config.regs;
        let candidate = self.regs.read_split64(map.scratch_high, map.scratch_low);
        if candidate == 0 {
            return Ok(None);
        }

        info!("started by in-place update from {:#x}", candidate);
        self.state.set(UpdateState::Done);
        self.regs.write_split64(map.scratch_high, map.scratch_low, 0);

        let region = BackupRegion::load(&self.regs, map.rsvd_ddr_addr, map.rsvd_ddr_size)
            .ok_or(UpdateError::InvalidRegionAtRestore)?;
        let report = restore_all(&self.registry, &mut self.mem, region).map_err(|e| {
            error!("restore failed: {}", e);
            UpdateError::Restore(e)
        })?;

        if let Some(watchdog) = self.watchdog.as_mut() {
            watchdog.restore().map_err(|_| UpdateError::Watchdog)?;
        }
        Ok(Some(report))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ROM SERVICES
    // ═══════════════════════════════════════════════════════════════════════

    /// Ask the ROM for an ordinary service. Refused while an update runs.
    pub fn request_rom_service(&mut self, service: RomService) -> Result<()> {
        if self.state.is_in_progress() {
            return Err(UpdateError::InProgress);
        }
        let map = self.config.regs;
        request_service(&mut self.regs, &map, service, self.config.rom_poll_budget)
            .map_err(UpdateError::Rom)
    }
}
