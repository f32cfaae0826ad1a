//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to the client: user
//! intents, host lifecycle, time, and the radio environment misbehaving. They
//! are generated randomly by proptest or the fuzzer and applied to a
//! [`crate::World`].

use arbitrary::Arbitrary;

/// Index into the world's locks, wrapped modulo the lock count.
pub type LockIndex = u8;

/// Fault a lock can be switched into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum FaultKind {
    /// Refuse connections.
    RefuseConnect,
    /// Fail identifier lookups.
    Unresolvable,
    /// Hide the control service.
    MissingService,
    /// Hide the release channel.
    MissingReleaseChannel,
    /// Never answer discovery.
    SilentDiscovery,
    /// Acknowledge writes with an error.
    WriteError,
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// User starts a scan.
    Scan,
    /// User stops the scan.
    StopScan,
    /// Every lock advertises once.
    Advertise,
    /// User picks the n-th listed lock.
    Select(u8),
    /// User abandons a connection attempt.
    CancelConnecting,
    /// User disconnects.
    Disconnect,
    /// User reconnects.
    Reconnect,
    /// User taps Open.
    Open,
    /// User taps the battery eject button.
    BatteryEject,
    /// User switches to the lock view.
    ShowLock,
    /// User switches to the battery view.
    ShowBattery,
    /// Host app suspended.
    Background,
    /// Host app resumed.
    Foreground,
    /// A lock drops its link.
    DropLink(LockIndex),
    /// Someone pulls the latch of an armed lock.
    PullLatch(LockIndex),
    /// A lock reports its battery as not ready.
    BatteryNotReady(LockIndex),
    /// Radio power toggled.
    RadioPower(bool),
    /// Time passes, in seconds.
    Elapse(u8),
    /// A lock starts or stops misbehaving.
    SetFault {
        /// Target lock.
        lock: LockIndex,
        /// Fault to switch.
        fault: FaultKind,
        /// On or off.
        enabled: bool,
    },
}
