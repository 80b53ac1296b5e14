//! Update configuration.
//!
//! Board addresses and policy knobs. Defaults describe the reference
//! board; integrators override individual fields with the builder
//! setters.

/// Runtime configuration area in PMC RAM.
pub const RTCFG_BASE: u32 = 0xF201_4000;

/// PMC global register block.
pub const PMC_GLOBAL_BASE: u32 = 0xF111_0000;

/// Clock and reset block.
pub const CRP_BASE: u32 = 0xF126_0000;

/// eFUSE cache.
pub const EFUSE_CACHE_BASE: u32 = 0xF125_0000;

/// Spins per millisecond of the pre-reset delay.
pub const MILLI_SEC: u32 = 0x10000;

/// Default ROM acknowledgement poll budget.
pub const ROM_SERVICE_TIMEOUT: u32 = 1_000_000;

// ═══════════════════════════════════════════════════════════════════════════
// POLICIES
// ═══════════════════════════════════════════════════════════════════════════

/// What happens to the watchdog right before relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPolicy {
    /// Kick it one last time; the ROM keeps servicing it across the handoff
    FinalKick,
    /// Stop it outright
    Stop,
}

/// What a failed handoff ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalAction {
    /// Hardware power-on reset
    PowerOnReset,
    /// Spin with interrupts masked so a debugger can attach
    Spin,
}

impl TerminalAction {
    /// Spin in debug builds, reset otherwise.
    pub const fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Spin
        } else {
            Self::PowerOnReset
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTER MAP
// ═══════════════════════════════════════════════════════════════════════════

/// Every hardware address the update path touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    /// Backup region base (persisted word)
    pub rsvd_ddr_addr: u32,
    /// Backup region size (persisted word)
    pub rsvd_ddr_size: u32,
    pub image_store_addr_high: u32,
    pub image_store_addr_low: u32,
    pub image_store_size: u32,
    /// Milliseconds to wait before a terminal reset
    pub ipor_delay: u32,
    /// Candidate image address, low word
    pub scratch_low: u32,
    /// Candidate image address, high word
    pub scratch_high: u32,
    pub rom_int: u32,
    pub rom_int_reason: u32,
    pub boot_err: u32,
    pub fw_err: u32,
    pub reset_ctrl: u32,
    pub por_mask: u32,
    /// Fuse word carrying the update-disable bit
    pub fuse: u32,
    pub fuse_disable_mask: u32,
    /// Where the trampoline is copied to
    pub safe_addr: u32,
    /// Entry of whatever image the ROM hands control to
    pub reset_vector: u32,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            rsvd_ddr_addr: RTCFG_BASE + 0x2A8,
            rsvd_ddr_size: RTCFG_BASE + 0x2AC,
            image_store_addr_high: RTCFG_BASE + 0x288,
            image_store_addr_low: RTCFG_BASE + 0x28C,
            image_store_size: RTCFG_BASE + 0x290,
            ipor_delay: RTCFG_BASE + 0x2BC,
            scratch_low: PMC_GLOBAL_BASE + 0x30,
            scratch_high: PMC_GLOBAL_BASE + 0x34,
            rom_int: PMC_GLOBAL_BASE + 0x40C0,
            rom_int_reason: PMC_GLOBAL_BASE + 0x40C4,
            boot_err: PMC_GLOBAL_BASE + 0x40C8,
            fw_err: PMC_GLOBAL_BASE + 0x1_0100,
            reset_ctrl: CRP_BASE + 0x31C,
            por_mask: 0x80,
            fuse: EFUSE_CACHE_BASE + 0x90,
            fuse_disable_mask: 1 << 12,
            safe_addr: 0xF201_2000,
            reset_vector: 0xF000_0000,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE CONFIG
// ═══════════════════════════════════════════════════════════════════════════

/// Update manager configuration.
#[derive(Debug, Clone, Copy)]
pub struct UpdateConfig {
    /// Watchdog handling before relocation.
    pub watchdog: WatchdogPolicy,
    /// Ticks to wait before asking modules again after "retry later".
    pub retry_delay_ticks: u32,
    /// Reads of the ROM reason register before giving up.
    pub rom_poll_budget: u32,
    /// What a failed handoff ends in.
    pub terminal: TerminalAction,
    pub regs: RegisterMap,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            watchdog: WatchdogPolicy::FinalKick,
            retry_delay_ticks: 10,
            rom_poll_budget: ROM_SERVICE_TIMEOUT,
            terminal: TerminalAction::for_build(),
            regs: RegisterMap::default(),
        }
    }
}

impl UpdateConfig {
    /// Set the watchdog policy.
    pub fn watchdog(mut self, policy: WatchdogPolicy) -> Self {
        self.watchdog = policy;
        self
    }

    /// Set the retry delay.
    pub fn retry_delay(mut self, ticks: u32) -> Self {
        self.retry_delay_ticks = ticks;
        self
    }

    pub fn rom_poll_budget(mut self, reads: u32) -> Self {
        self.rom_poll_budget = reads;
        self
    }

    pub fn terminal(mut self, action: TerminalAction) -> Self {
        self.terminal = action;
        self
    }

    /// Use a different register map.
    pub fn registers(mut self, regs: RegisterMap) -> Self {
        self.regs = regs;
        self
    }
}
