// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The device ledger: a durable record of every device that has been
//! committed to the ring, kept so that such a device is never reformatted.
//!
//! The whole mapping is stored as one JSON blob under a single key of a
//! key-value store that lives outside of the unit's own state:
//!
//! ```json
//! {"vdb@0b7e...": {"blkid": "808bc298-...", "status": "active"}}
//! ```
//!
//! Any failure to read, parse or write the ledger is returned to the caller.
//! A ledger that can not be read is never treated as an empty one.

use std::{
    collections::{btree_map, BTreeMap},
    slice,
};

use crate::{
    engine::{
        consts::LEDGER_KEY,
        kvstore::{KvStore, StoreProvider},
        reconcile::{remote_claims_device, PeerRelation},
        types::{DeploymentId, DeviceName, DeviceRecord, LedgerKey, MembershipQuery},
    },
    swift::{SwiftError, SwiftResult},
};

/// The decoded content of the ledger.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DeviceLedger {
    records: BTreeMap<LedgerKey, DeviceRecord>,
}

impl DeviceLedger {
    pub fn decode(blob: &[u8]) -> SwiftResult<DeviceLedger> {
        serde_json::from_slice(blob).map_err(|err| {
            SwiftError::Chained(
                "Unable to decode the device ledger".into(),
                Box::new(SwiftError::Serde(err)),
            )
        })
    }

    pub fn encode(&self) -> SwiftResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Read the ledger from store. A store without a ledger holds an empty
    /// one.
    pub fn load<S: KvStore>(store: &S) -> SwiftResult<DeviceLedger> {
        match store.get(LEDGER_KEY)? {
            Some(blob) => DeviceLedger::decode(&blob),
            None => Ok(DeviceLedger::default()),
        }
    }

    /// Stage the ledger in store. The caller flushes.
    pub fn save<S: KvStore>(&self, store: &mut S) -> SwiftResult<()> {
        store.set(LEDGER_KEY, &self.encode()?)
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&DeviceRecord> {
        self.records.get(key)
    }

    pub fn insert(&mut self, key: LedgerKey, record: DeviceRecord) -> Option<DeviceRecord> {
        self.records.insert(key, record)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, LedgerKey, DeviceRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Operations on the ledger on behalf of one deployment.
///
/// Every operation opens the store, does its work and drops the store
/// before returning, so that no lock is held between operations.
pub struct Ledger<'a, P> {
    provider: &'a P,
    deployment: &'a DeploymentId,
}

impl<'a, P: StoreProvider> Ledger<'a, P> {
    pub fn new(provider: &'a P, deployment: &'a DeploymentId) -> Ledger<'a, P> {
        Ledger {
            provider,
            deployment,
        }
    }

    /// The current content of the ledger.
    pub fn contents(&self) -> SwiftResult<DeviceLedger> {
        if !self.provider.ensure_location()? {
            return Ok(DeviceLedger::default());
        }
        let store = self.provider.open()?;
        DeviceLedger::load(&store)
    }

    /// Record the devices as committed to the ring under this deployment.
    ///
    /// A device already recorded under this deployment with the same
    /// filesystem UUID is left alone. A device found recorded with the same
    /// UUID under another deployment is reported and recorded again under
    /// this one; the old record is never merged or removed.
    /// The ledger is written once, after the whole batch has been processed.
    ///
    /// Returns the keys of the other deployments' records that were reported.
    pub fn record<F>(&self, devices: &[DeviceName], identity: F) -> SwiftResult<Vec<LedgerKey>>
    where
        F: Fn(&DeviceName) -> Option<String>,
    {
        self.provider.ensure_location()?;
        let mut store = self.provider.open()?;
        let mut ledger = DeviceLedger::load(&store)?;

        let mut collisions = Vec::new();
        let mut changed = false;
        for device in devices {
            let blkid = identity(device);
            let key = LedgerKey::new(device, self.deployment);

            if let Some(record) = ledger.get(&key).filter(|r| r.blkid == blkid) {
                debug!(
                    "Device '{}' already in ledger (status: {})",
                    device, record.status
                );
                continue;
            }

            for (previous, _) in ledger.iter().filter(|(k, r)| {
                k.device == *device
                    && k.deployment != *self.deployment
                    && r.has_blkid(blkid.as_deref())
            }) {
                warn!(
                    "Device '{}' is already in the ledger as {} under a different deployment \
                     (current={}, previous={}); it is recorded again as {}. The device was \
                     probably added to the ring by a previous deployment; the old record \
                     must be removed by hand if the device is ever to be reformatted.",
                    device, previous, self.deployment, previous.deployment, key
                );
                collisions.push(previous.clone());
            }

            debug!(
                "Adding device '{}' with blkid={} to ledger",
                device,
                blkid.as_deref().unwrap_or("<none>")
            );
            ledger.insert(key, DeviceRecord::active(blkid));
            changed = true;
        }

        if changed {
            ledger.save(&mut store)?;
            store.flush()?;
        }
        Ok(collisions)
    }

    /// Decide whether the device has been committed to the ring.
    ///
    /// The ledger is consulted first. If it is silent and the query permits
    /// it, the device list this unit last published on the storage relation
    /// is consulted; a device found there is added to the ledger before true
    /// is returned.
    pub fn is_committed<F, R>(
        &self,
        device: &DeviceName,
        identity: F,
        relation: &R,
        query: MembershipQuery,
    ) -> SwiftResult<bool>
    where
        F: Fn(&DeviceName) -> Option<String>,
        R: PeerRelation + ?Sized,
    {
        if !self.provider.ensure_location()? {
            info!("Device '{device}' does not appear to be in use by Swift");
            return Ok(false);
        }

        // The store is released before any write back below.
        let ledger = DeviceLedger::load(&self.provider.open()?)?;

        let key = LedgerKey::new(device, self.deployment);
        let mut deactivated = false;
        if !ledger.is_empty() {
            let blkid = identity(device);

            // Under its own key a device matches if its UUID is unchanged,
            // including a device that had no filesystem when recorded.
            if let Some(record) = ledger.get(&key).filter(|r| r.blkid == blkid) {
                if record.is_active() {
                    info!("Device '{device}' appears to be in use by Swift (found in ledger)");
                    return Ok(true);
                }
                deactivated = query.ignore_deactivated;
            }

            if let Some((other, _)) = ledger.iter().find(|(k, r)| {
                **k != key
                    && r.has_blkid(blkid.as_deref())
                    && !(query.ignore_deactivated && !r.is_active())
            }) {
                info!(
                    "Device '{}' appears to be in use by Swift (found in ledger) but is \
                     recorded as {} rather than {}. This could indicate that the device was \
                     added as part of a previous deployment; it will require manual removal \
                     or updating if it needs to be reformatted.",
                    device, other, key
                );
                return Ok(true);
            }
        }

        if query.skip_remote_check {
            info!("Device '{device}' does not appear to be in use by Swift (searched ledger only)");
            return Ok(false);
        }

        if remote_claims_device(relation, device)? {
            if deactivated {
                info!(
                    "Device '{device}' is announced on the storage relation but its ledger \
                     record is deactivated; ignoring the announcement"
                );
            } else {
                info!(
                    "Device '{device}' appears to be in use by Swift (found on storage \
                     relation) but was not found in ledger; adding it to the ledger"
                );
                self.record(slice::from_ref(device), &identity)?;
                return Ok(true);
            }
        }

        info!(
            "Device '{device}' does not appear to be in use by Swift (searched ledger and \
             storage relation)"
        );
        Ok(false)
    }
}
