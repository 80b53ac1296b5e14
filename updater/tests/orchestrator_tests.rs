//! Update request through handoff

mod common;

use common::*;
use plm_hwinit::Memory;
use plm_persistent::{HandlerError, PersistError};
use plm_updater::{
    DsDescriptor, DsId, DsOps, DsVersion, GateError, HeaderWordGate, ModuleId,
    ModuleShutdownState, RomService, ShutdownPhase, ShutdownResponse, UpdateConfig, UpdateError,
    UpdatePhase, UpdateRequest, UpdateState, UpdateTask, WatchdogPolicy,
};

fn request_with(acks: &AckLog) -> UpdateRequest {
    UpdateRequest::at(IMAGE).acknowledged_by(Box::new(Requester(acks.clone())))
}

fn two_module_context(config: UpdateConfig, journal: &Journal) -> TestContext {
    let mut ctx = context(config);
    ctx.register_module(ModuleId(1), Some(ScriptedModule::ok(1, journal)))
        .unwrap();
    ctx.register_module(ModuleId(2), Some(ScriptedModule::ok(2, journal)))
        .unwrap();
    register_structures(&mut ctx);
    ctx
}

#[test]
fn test_happy_path_reaches_handoff() {
    let journal = Journal::default();
    let events = EventLog::default();
    let acks = AckLog::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal)
        .with_watchdog(FakeWatchdog {
            log: events.clone(),
            fail: false,
        })
        .with_error_actions(FakeErrorActions(events.clone()));

    ctx.request_update(request_with(&acks)).unwrap();

    assert_eq!(ctx.state(), UpdateState::InProgress);
    assert_eq!(ctx.phase(), UpdatePhase::ShutdownComplete);
    assert_eq!(
        ctx.module_state(ModuleId(1)),
        Some(ModuleShutdownState::ShutdownInitiated)
    );
    assert_eq!(ctx.tasks().len(), 1);
    assert!(acks.borrow().is_empty());

    assert_eq!(run_until_handoff(&mut ctx), IMAGE);

    assert_eq!(*acks.borrow(), vec![Ok(())]);
    assert_eq!(ctx.state(), UpdateState::Idle);
    assert_eq!(ctx.phase(), UpdatePhase::Relocate);
    assert_eq!(
        ctx.module_state(ModuleId(2)),
        Some(ModuleShutdownState::ShutdownCompleted)
    );
    assert_eq!(*events.borrow(), vec!["quiesce errors", "kick"]);

    // Backup header: version 1, 12-byte header, (2 * 12 + 24) / 4 words
    let region = u64::from(REGION_BASE);
    assert_eq!(ctx.mem().read_u32(region).unwrap(), 1);
    assert_eq!(ctx.mem().read_u32(region + 4).unwrap(), 12);
    assert_eq!(ctx.mem().read_u32(region + 8).unwrap(), 12);
}

#[test]
fn test_second_request_rejected_without_mutation() {
    let journal = Journal::default();
    let first = AckLog::default();
    let second = AckLog::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);

    ctx.request_update(request_with(&first)).unwrap();
    let calls_before = journal.borrow().len();

    assert_eq!(
        ctx.request_update(request_with(&second)),
        Err(UpdateError::InProgress)
    );

    assert_eq!(journal.borrow().len(), calls_before);
    assert_eq!(ctx.tasks().len(), 1);
    assert_eq!(ctx.state(), UpdateState::InProgress);
    assert!(second.borrow().is_empty());
}

#[test]
fn test_initiate_failure_aborts_initiated_modules_once() {
    let journal = Journal::default();
    let mut ctx = context(UpdateConfig::default());
    // Initiated last to first: A, B, then C refuses
    ctx.register_module(
        ModuleId(3),
        Some(ScriptedModule::scripted(
            3,
            &journal,
            ShutdownResponse::Failure(0x42),
            &[],
        )),
    )
    .unwrap();
    ctx.register_module(ModuleId(2), Some(ScriptedModule::ok(2, &journal)))
        .unwrap();
    ctx.register_module(ModuleId(1), Some(ScriptedModule::ok(1, &journal)))
        .unwrap();

    let err = ctx.request_update(UpdateRequest::at(IMAGE)).unwrap_err();

    assert_eq!(
        err,
        UpdateError::ShutdownInitiate {
            module: ModuleId(3)
        }
    );
    assert_eq!(calls(&journal, 1, ShutdownPhase::Abort), 1);
    assert_eq!(calls(&journal, 2, ShutdownPhase::Abort), 1);
    assert_eq!(calls(&journal, 3, ShutdownPhase::Abort), 0);
    assert_eq!(ctx.state(), UpdateState::Idle);
    assert_eq!(ctx.phase(), UpdatePhase::Idle);
    assert!(ctx.tasks().is_empty());
    for id in 1..=3 {
        assert_eq!(
            ctx.module_state(ModuleId(id)),
            Some(ModuleShutdownState::Normal)
        );
    }
}

#[test]
fn test_retry_later_reschedules_complete_only() {
    let journal = Journal::default();
    let mut ctx = context(UpdateConfig::default().retry_delay(5));
    ctx.register_module(
        ModuleId(1),
        Some(ScriptedModule::scripted(
            1,
            &journal,
            ShutdownResponse::Success,
            &[ShutdownResponse::RetryLater],
        )),
    )
    .unwrap();
    ctx.register_module(ModuleId(2), Some(ScriptedModule::ok(2, &journal)))
        .unwrap();
    register_structures(&mut ctx);

    ctx.request_update(UpdateRequest::at(IMAGE)).unwrap();
    assert_eq!(ctx.run_pending(), Ok(1));

    assert_eq!(ctx.state(), UpdateState::InProgress);
    assert_eq!(ctx.phase(), UpdatePhase::ShutdownComplete);
    assert_eq!(calls(&journal, 1, ShutdownPhase::Complete), 1);

    ctx.tick(4);
    assert_eq!(ctx.run_pending(), Ok(0));
    ctx.tick(1);
    assert_eq!(run_until_handoff(&mut ctx), IMAGE);

    assert_eq!(calls(&journal, 1, ShutdownPhase::Initiate), 1);
    assert_eq!(calls(&journal, 1, ShutdownPhase::Complete), 2);
    // Module 2 completed on the first pass and is not asked again
    assert_eq!(calls(&journal, 2, ShutdownPhase::Complete), 1);
}

#[test]
fn test_fuse_disables_updates() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    let map = ctx.config().regs;
    ctx.regs_mut().set(map.fuse, map.fuse_disable_mask);

    assert_eq!(
        ctx.request_update(UpdateRequest::at(IMAGE)),
        Err(UpdateError::Disabled)
    );
    assert!(journal.borrow().is_empty());
    assert_eq!(ctx.state(), UpdateState::Idle);
}

#[test]
fn test_missing_region_rejected() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    let map = ctx.config().regs;
    ctx.regs_mut().set(map.rsvd_ddr_addr, 0);

    assert_eq!(
        ctx.request_update(UpdateRequest::at(IMAGE)),
        Err(UpdateError::InvalidRegion)
    );
    assert!(journal.borrow().is_empty());
}

#[test]
fn test_region_must_hold_whole_registry() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    let map = ctx.config().regs;
    let exact = ctx.registry().serialized_size();
    assert_eq!(exact, 12 + 2 * 12 + 24);

    ctx.regs_mut().set(map.rsvd_ddr_size, exact as u32 - 1);
    assert_eq!(
        ctx.request_update(UpdateRequest::at(IMAGE)),
        Err(UpdateError::InsufficientRegion {
            needed: exact,
            capacity: exact - 1
        })
    );
    assert!(journal.borrow().is_empty());

    ctx.regs_mut().set(map.rsvd_ddr_size, exact as u32);
    assert!(ctx.request_update(UpdateRequest::at(IMAGE)).is_ok());
}

#[test]
fn test_gate_rejection_leaves_everything_idle() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal).with_gate(HeaderWordGate {
        offset: 0x10,
        expected: 0x5AFE_C0DE,
        code: 0x44,
    });

    assert_eq!(
        ctx.request_update(UpdateRequest::at(IMAGE)),
        Err(UpdateError::Incompatible(GateError(0x44)))
    );
    assert!(journal.borrow().is_empty());
    assert_eq!(ctx.phase(), UpdatePhase::Idle);

    ctx.mem_mut().write_u32(IMAGE + 0x10, 0x5AFE_C0DE).unwrap();
    assert!(ctx.request_update(UpdateRequest::at(IMAGE)).is_ok());
}

#[test]
fn test_complete_failure_is_fatal_and_acknowledged() {
    let journal = Journal::default();
    let acks = AckLog::default();
    let mut ctx = context(UpdateConfig::default());
    ctx.register_module(
        ModuleId(1),
        Some(ScriptedModule::scripted(
            1,
            &journal,
            ShutdownResponse::Success,
            &[ShutdownResponse::Failure(0x99)],
        )),
    )
    .unwrap();
    ctx.register_module(ModuleId(2), Some(ScriptedModule::ok(2, &journal)))
        .unwrap();

    ctx.request_update(request_with(&acks)).unwrap();
    let expected = UpdateError::ShutdownComplete {
        module: ModuleId(1),
        code: 0x99,
    };
    assert_eq!(ctx.run_pending(), Err(expected));

    assert_eq!(*acks.borrow(), vec![Err(expected)]);
    assert_eq!(ctx.state(), UpdateState::Idle);
    assert_eq!(
        ctx.module_state(ModuleId(2)),
        Some(ModuleShutdownState::ShutdownCompleted)
    );
    assert_eq!(
        ctx.module_state(ModuleId(1)),
        Some(ModuleShutdownState::ShutdownInitiated)
    );
    assert_eq!(calls(&journal, 2, ShutdownPhase::Abort), 0);
}

struct Failing;

impl DsOps for Failing {
    fn store(
        &self,
        _desc: &DsDescriptor,
        _mem: &mut dyn Memory,
        _dest: u64,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::Rejected(0x5))
    }
}

static FAILING: Failing = Failing;

#[test]
fn test_backup_failure_clears_in_progress() {
    let journal = Journal::default();
    let acks = AckLog::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    let id = DsId::new(ModuleId(3), 7);
    ctx.register_ds(
        DsDescriptor::new(id, DsVersion::any(1), LIVE_BASE + 0x200, 4).with_ops(&FAILING),
    )
    .unwrap();

    ctx.request_update(request_with(&acks)).unwrap();
    let expected = UpdateError::Backup(PersistError::Handler {
        id,
        source: HandlerError::Rejected(0x5),
    });

    assert_eq!(ctx.run_pending(), Err(expected));
    assert_eq!(expected.code(), 0x210);
    assert_eq!(*acks.borrow(), vec![Err(expected)]);
    assert_eq!(ctx.state(), UpdateState::Idle);
    assert!(ctx.tasks().is_empty());
}

#[test]
fn test_watchdog_stop_failure_aborts_before_relocation() {
    let journal = Journal::default();
    let events = EventLog::default();
    let acks = AckLog::default();
    let mut ctx = two_module_context(
        UpdateConfig::default().watchdog(WatchdogPolicy::Stop),
        &journal,
    )
    .with_watchdog(FakeWatchdog {
        log: events.clone(),
        fail: true,
    })
    .with_error_actions(FakeErrorActions(events.clone()));

    ctx.request_update(request_with(&acks)).unwrap();
    assert_eq!(ctx.run_pending(), Err(UpdateError::Watchdog));
    assert_eq!(
        *events.borrow(),
        vec!["quiesce errors", "stop", "restore errors"]
    );
    assert_eq!(*acks.borrow(), vec![Err(UpdateError::Watchdog)]);
    assert_eq!(ctx.state(), UpdateState::Idle);
}

#[test]
fn test_image_store_source() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    let map = ctx.config().regs;

    assert_eq!(
        ctx.request_update(UpdateRequest::from_image_store()),
        Err(UpdateError::ImageStore)
    );
    assert!(journal.borrow().is_empty());

    ctx.regs_mut().set(map.image_store_addr_high, 0x8);
    ctx.regs_mut().set(map.image_store_addr_low, 0x40);
    ctx.regs_mut().set(map.image_store_size, 0x2000);
    ctx.request_update(UpdateRequest::from_image_store()).unwrap();

    assert_eq!(run_until_handoff(&mut ctx), 0x8_0000_0040);
}

#[test]
fn test_modules_without_handlers_and_duplicates() {
    let mut ctx = context(UpdateConfig::default());
    ctx.register_module(ModuleId(4), None).unwrap();
    assert_eq!(
        ctx.register_module(ModuleId(4), None),
        Err(UpdateError::DuplicateModule {
            module: ModuleId(4)
        })
    );

    ctx.request_update(UpdateRequest::at(IMAGE)).unwrap();
    assert_eq!(run_until_handoff(&mut ctx), IMAGE);
    assert_eq!(
        ctx.module_state(ModuleId(4)),
        Some(ModuleShutdownState::ShutdownCompleted)
    );
}

#[test]
fn test_stray_task_reports_not_found() {
    let mut ctx = context(UpdateConfig::default());
    assert_eq!(
        ctx.run_task(UpdateTask::CompleteShutdown),
        Err(UpdateError::TaskNotFound)
    );
}

#[test]
fn test_rom_services_refused_during_update() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    let map = ctx.config().regs;
    ctx.regs_mut().script(map.rom_int_reason, &[RomService::Sha2Hash.mask()]);
    assert_eq!(ctx.request_rom_service(RomService::Sha2Hash), Ok(()));

    ctx.request_update(UpdateRequest::at(IMAGE)).unwrap();
    assert_eq!(
        ctx.request_rom_service(RomService::Sha2Hash),
        Err(UpdateError::InProgress)
    );
}

#[test]
fn test_state_flag_tracks_request() {
    let journal = Journal::default();
    let mut ctx = two_module_context(UpdateConfig::default(), &journal);
    assert!(!ctx.state_flag().is_in_progress());

    ctx.request_update(UpdateRequest::at(IMAGE)).unwrap();
    assert!(ctx.state_flag().is_in_progress());
    assert!(!ctx.state_flag().is_done());
}
