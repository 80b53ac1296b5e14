//! Fakes shared by the orchestrator tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use plm_hwinit::{FakeRegisterFile, Memory, SparseMemory};
use plm_updater::{
    Acknowledge, DsDescriptor, DsId, DsVersion, ErrorActions, HandoffChannel, ModuleId,
    ShutdownPhase, ShutdownResponse, Shutdownable, UpdateConfig, UpdateContext, UpdateError,
    Watchdog, WatchdogError,
};

pub const LIVE_BASE: u64 = 0x1000_0000;
pub const REGION_BASE: u32 = 0x4000_0000;
pub const REGION_SIZE: u32 = 0x400;
pub const IMAGE: u64 = 0x8_0000_0000;

pub type Journal = Rc<RefCell<Vec<(u16, ShutdownPhase)>>>;
pub type TestContext = UpdateContext<FakeRegisterFile, SparseMemory, FakeHandoff>;

// ═══════════════════════════════════════════════════════════════════════════
// HANDOFF
// ═══════════════════════════════════════════════════════════════════════════

/// Panic payload standing in for "control left this image".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandedOff(pub u64);

#[derive(Debug, Default)]
pub struct FakeHandoff;

impl HandoffChannel for FakeHandoff {
    fn relocate_and_jump(&mut self, image: u64) -> ! {
        std::panic::panic_any(HandedOff(image))
    }
}

/// Run due tasks and return the image control was handed to.
pub fn run_until_handoff(ctx: &mut TestContext) -> u64 {
    let outcome = catch_unwind(AssertUnwindSafe(|| ctx.run_pending()));
    match outcome {
        Ok(result) => panic!("no handoff, run_pending returned {:?}", result),
        Err(payload) => match payload.downcast::<HandedOff>() {
            Ok(handed) => handed.0,
            Err(_) => panic!("unexpected panic before handoff"),
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════

pub struct ScriptedModule {
    id: u16,
    journal: Journal,
    initiate: ShutdownResponse,
    complete: VecDeque<ShutdownResponse>,
}

impl ScriptedModule {
    /// Module that succeeds every phase.
    pub fn ok(id: u16, journal: &Journal) -> Box<dyn Shutdownable> {
        Self::scripted(id, journal, ShutdownResponse::Success, &[])
    }

    pub fn scripted(
        id: u16,
        journal: &Journal,
        initiate: ShutdownResponse,
        complete: &[ShutdownResponse],
    ) -> Box<dyn Shutdownable> {
        Box::new(Self {
            id,
            journal: journal.clone(),
            initiate,
            complete: complete.iter().copied().collect(),
        })
    }
}

impl Shutdownable for ScriptedModule {
    fn shutdown(&mut self, phase: ShutdownPhase) -> ShutdownResponse {
        self.journal.borrow_mut().push((self.id, phase));
        match phase {
            ShutdownPhase::Initiate => self.initiate,
            ShutdownPhase::Complete => self
                .complete
                .pop_front()
                .unwrap_or(ShutdownResponse::Success),
            ShutdownPhase::Abort => ShutdownResponse::Success,
        }
    }
}

/// Calls of `phase` made to module `id`.
pub fn calls(journal: &Journal, id: u16, phase: ShutdownPhase) -> usize {
    journal
        .borrow()
        .iter()
        .filter(|(m, p)| *m == id && *p == phase)
        .count()
}

// ═══════════════════════════════════════════════════════════════════════════
// REQUESTER / WATCHDOG / ERROR ACTIONS
// ═══════════════════════════════════════════════════════════════════════════

pub type AckLog = Rc<RefCell<Vec<Result<(), UpdateError>>>>;

pub struct Requester(pub AckLog);

impl Acknowledge for Requester {
    fn acknowledge(&mut self, result: Result<(), UpdateError>) {
        self.0.borrow_mut().push(result);
    }
}

pub type EventLog = Rc<RefCell<Vec<&'static str>>>;

pub struct FakeWatchdog {
    pub log: EventLog,
    pub fail: bool,
}

impl Watchdog for FakeWatchdog {
    fn kick(&mut self) -> Result<(), WatchdogError> {
        self.log.borrow_mut().push("kick");
        if self.fail {
            Err(WatchdogError(0xA))
        } else {
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<(), WatchdogError> {
        self.log.borrow_mut().push("stop");
        if self.fail {
            Err(WatchdogError(0xB))
        } else {
            Ok(())
        }
    }

    fn restore(&mut self) -> Result<(), WatchdogError> {
        self.log.borrow_mut().push("restore");
        Ok(())
    }
}

pub struct FakeErrorActions(pub EventLog);

impl ErrorActions for FakeErrorActions {
    fn quiesce(&mut self) {
        self.0.borrow_mut().push("quiesce errors");
    }

    fn restore(&mut self) {
        self.0.borrow_mut().push("restore errors");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BOARD
// ═══════════════════════════════════════════════════════════════════════════

/// Registers with the backup region published, memory with live data,
/// region and a small image mapped.
pub fn board(config: &UpdateConfig) -> (FakeRegisterFile, SparseMemory) {
    let mut regs = FakeRegisterFile::new();
    regs.set(config.regs.rsvd_ddr_addr, REGION_BASE);
    regs.set(config.regs.rsvd_ddr_size, REGION_SIZE);

    let mut mem = SparseMemory::new();
    mem.map(LIVE_BASE, 0x1000)
        .map(u64::from(REGION_BASE), REGION_SIZE as usize)
        .map(IMAGE, 0x100);
    mem.write(LIVE_BASE, &[0x11; 8]).unwrap();
    mem.write(LIVE_BASE + 0x100, &[0x22; 16]).unwrap();
    (regs, mem)
}

pub fn context(config: UpdateConfig) -> TestContext {
    let (regs, mem) = board(&config);
    UpdateContext::new(config, regs, mem, FakeHandoff)
}

/// The two structures every test image carries.
pub fn register_structures(ctx: &mut TestContext) {
    ctx.register_ds(DsDescriptor::new(
        DsId::new(ModuleId(1), 1),
        DsVersion::any(1),
        LIVE_BASE,
        8,
    ))
    .unwrap();
    ctx.register_ds(DsDescriptor::new(
        DsId::new(ModuleId(2), 1),
        DsVersion::any(1),
        LIVE_BASE + 0x100,
        16,
    ))
    .unwrap();
}
