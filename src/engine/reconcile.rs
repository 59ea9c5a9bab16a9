// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Reconcile the ledger with the device list this unit announces to the
// proxy over the storage relation. Units deployed before the ledger existed
// only ever announced their devices, so the announcement is a second source
// of ring membership and is folded back into the ledger when it is used.

use itertools::Itertools;

use crate::{
    engine::{
        consts::DEVICE_SEPARATOR,
        kvstore::StoreProvider,
        ledger::Ledger,
        types::{DeviceName, MembershipQuery},
    },
    swift::SwiftResult,
};

/// This unit's own side of the storage relation.
pub trait PeerRelation {
    /// The colon separated device list this unit currently publishes, if
    /// any.
    fn outbound_device_announcement(&self) -> SwiftResult<Option<String>>;

    /// Publish devices as this unit's device list.
    fn set_outbound_device_announcement(&self, devices: &[DeviceName]) -> SwiftResult<()>;
}

/// Split an announcement into its device names. Empty components are
/// dropped.
pub fn parse_announcement(announcement: &str) -> impl Iterator<Item = &str> + '_ {
    announcement
        .split(DEVICE_SEPARATOR)
        .map(str::trim)
        .filter(|d| !d.is_empty())
}

/// True if the device is an exact component of the device list published by
/// this unit.
pub fn remote_claims_device<R>(relation: &R, device: &DeviceName) -> SwiftResult<bool>
where
    R: PeerRelation + ?Sized,
{
    Ok(relation
        .outbound_device_announcement()?
        .map(|announcement| parse_announcement(&announcement).any(|d| d == &**device))
        .unwrap_or(false))
}

/// The devices currently announced on the relation. Components that are not
/// valid device names are skipped.
pub fn announced_devices<R>(relation: &R) -> SwiftResult<Vec<DeviceName>>
where
    R: PeerRelation + ?Sized,
{
    Ok(relation
        .outbound_device_announcement()?
        .map(|announcement| {
            parse_announcement(&announcement)
                .filter_map(|d| match DeviceName::new(d.to_owned()) {
                    Ok(name) => Some(name),
                    Err(err) => {
                        warn!("Ignoring announced device \"{d}\": {err}");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Record devices in the ledger and then announce them on the relation.
/// Nothing is announced unless the devices were recorded first.
pub fn announce_devices<P, F, R>(
    ledger: &Ledger<'_, P>,
    relation: &R,
    devices: &[DeviceName],
    identity: F,
) -> SwiftResult<()>
where
    P: StoreProvider,
    F: Fn(&DeviceName) -> Option<String>,
    R: PeerRelation + ?Sized,
{
    ledger.record(devices, identity)?;
    info!(
        "Announcing {} device(s) on the storage relation",
        devices.len()
    );
    relation.set_outbound_device_announcement(devices)
}

/// Make sure every device announced on the relation is also in the ledger.
/// Returns the devices that had to be added.
pub fn ensure_devs_tracked<P, F, R>(
    ledger: &Ledger<'_, P>,
    relation: &R,
    identity: F,
) -> SwiftResult<Vec<DeviceName>>
where
    P: StoreProvider,
    F: Fn(&DeviceName) -> Option<String>,
    R: PeerRelation + ?Sized,
{
    let mut untracked = Vec::new();
    for device in announced_devices(relation)? {
        if !ledger.is_committed(&device, &identity, relation, MembershipQuery::local_only())? {
            untracked.push(device);
        }
    }

    if untracked.is_empty() {
        debug!("All announced devices are tracked in the ledger");
    } else {
        info!(
            "Adding {} announced device(s) to the ledger: {}",
            untracked.len(),
            untracked.iter().join(", ")
        );
        ledger.record(&untracked, &identity)?;
    }
    Ok(untracked)
}

#[cfg(test)]
mod tests {
    use crate::engine::{
        tests::{init_logger, FakeRelation, MemStoreProvider},
        types::{DeploymentId, DeviceRecord, LedgerKey},
    };

    use super::*;

    fn name(s: &str) -> DeviceName {
        DeviceName::new(s.into()).unwrap()
    }

    fn names(ds: &[&str]) -> Vec<DeviceName> {
        ds.iter().map(|d| name(d)).collect()
    }

    fn identity(d: &DeviceName) -> Option<String> {
        Some(format!("uuid-{d}"))
    }

    fn no_uuid(_: &DeviceName) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_announcement() {
        assert_eq!(
            parse_announcement("vdb:vdc::cciss/c0d0:").collect::<Vec<_>>(),
            vec!["vdb", "vdc", "cciss/c0d0"]
        );
        assert_eq!(parse_announcement("").count(), 0);
    }

    #[test]
    fn test_remote_claims_exact_component() {
        let relation = FakeRelation::announcing("vdb:vdc");
        assert!(remote_claims_device(&relation, &name("vdb")).unwrap());
        assert!(remote_claims_device(&relation, &name("vdc")).unwrap());
        assert!(!remote_claims_device(&relation, &name("vd")).unwrap());
        assert!(!remote_claims_device(&FakeRelation::silent(), &name("vdb")).unwrap());
    }

    #[test]
    fn test_announce_records_first() {
        init_logger();
        let provider = MemStoreProvider::new();
        let env = DeploymentId::new("env1".into()).unwrap();
        let ledger = Ledger::new(&provider, &env);
        let relation = FakeRelation::silent();

        announce_devices(&ledger, &relation, &names(&["vdb", "vdc"]), identity).unwrap();

        assert_eq!(relation.announced(), Some("vdb:vdc".into()));
        let contents = ledger.contents().unwrap();
        for d in ["vdb", "vdc"] {
            assert_eq!(
                contents.get(&LedgerKey::new(&name(d), &env)),
                Some(&DeviceRecord::active(Some(format!("uuid-{d}"))))
            );
        }
    }

    #[test]
    fn test_announce_nothing_if_ledger_fails() {
        let provider = MemStoreProvider::failing();
        let env = DeploymentId::new("env1".into()).unwrap();
        let ledger = Ledger::new(&provider, &env);
        let relation = FakeRelation::silent();

        assert_matches!(
            announce_devices(&ledger, &relation, &names(&["vdb"]), identity),
            Err(_)
        );
        assert_eq!(relation.announced(), None);
    }

    #[test]
    fn test_ensure_devs_tracked() {
        init_logger();
        let provider = MemStoreProvider::new();
        let env = DeploymentId::new("env1".into()).unwrap();
        let ledger = Ledger::new(&provider, &env);
        ledger.record(&names(&["vdb"]), identity).unwrap();

        let relation = FakeRelation::announcing("vdb:vdc:vdd");
        assert_eq!(
            ensure_devs_tracked(&ledger, &relation, identity).unwrap(),
            names(&["vdc", "vdd"])
        );
        assert_eq!(ledger.contents().unwrap().len(), 3);

        // Everything is tracked now.
        assert!(ensure_devs_tracked(&ledger, &relation, identity)
            .unwrap()
            .is_empty());
        assert_eq!(provider.flushes(), 2);
    }

    #[test]
    fn test_ensure_devs_tracked_unknown_identity() {
        init_logger();
        let provider = MemStoreProvider::new();
        let env = DeploymentId::new("env1".into()).unwrap();
        let ledger = Ledger::new(&provider, &env);
        let relation = FakeRelation::announcing("vdb");

        assert_eq!(
            ensure_devs_tracked(&ledger, &relation, no_uuid).unwrap(),
            names(&["vdb"])
        );
        assert!(ensure_devs_tracked(&ledger, &relation, no_uuid)
            .unwrap()
            .is_empty());
        assert_eq!(provider.flushes(), 1);
    }

    #[test]
    fn test_ensure_devs_tracked_without_announcement() {
        let provider = MemStoreProvider::new();
        let env = DeploymentId::new("env1".into()).unwrap();
        let ledger = Ledger::new(&provider, &env);
        assert!(ensure_devs_tracked(&ledger, &FakeRelation::silent(), identity)
            .unwrap()
            .is_empty());
        assert_eq!(provider.flushes(), 0);
    }
}
