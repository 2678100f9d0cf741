/// Engine notifications: lightweight messages sent from the engine to the
/// consumer via a bounded crossbeam channel.
///
/// Newly discovered references are not sent here; they accumulate in the
/// results buffer and are drained with the completed-work-order calls.
use super::ReferenceHandle;
use crate::error::EnumerationError;
use crate::package::PackageGroupId;
use compact_str::CompactString;
use std::path::PathBuf;
use std::time::Duration;

/// Sent with `try_send`: when the channel is full the event is dropped and a
/// warning logged, so reload and enumeration never wait on the consumer.
#[derive(Debug)]
pub enum EngineEvent {
    /// Reload created the virtual root of a package group.
    PackageGroupAdded {
        group: PackageGroupId,
        root: ReferenceHandle,
        location: PathBuf,
    },
    /// Reload created the hard reference of a package and submitted it.
    PackageEnumerated {
        group: PackageGroupId,
        package: CompactString,
        reference: ReferenceHandle,
    },
    /// A reference moved to `Failed`.
    EnumerationFailed {
        reference: ReferenceHandle,
        error: EnumerationError,
    },
    /// Reload finished seeding the scheduler.
    ReloadComplete {
        groups: usize,
        packages: usize,
        duration: Duration,
    },
}
