// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub use self::{
    cmd::verify_binaries,
    config::{CharmConfig, ConfigProvider, NodeSettings},
    discovery::{
        determine_block_devices, find_block_devices, guess_block_devices, BlockDeviceDirective,
    },
    host::{HostDevices, LinuxHost},
    identity::{get_uuid, host_identity, resolve_path},
    kvstore::{FileKvStore, FileStoreProvider, KvStore, StoreProvider},
    ledger::{DeviceLedger, Ledger},
    provision::{
        load_prepared_devices, save_prepared_devices, setup_storage, DeviceProvisioner,
        HostProvisioner,
    },
    reconcile::{
        announce_devices, announced_devices, ensure_devs_tracked, remote_claims_device,
        PeerRelation,
    },
    relation::JujuRelation,
    types::{
        DeploymentId, DeviceName, DeviceRecord, DeviceStatus, LedgerKey, MembershipQuery,
    },
};

pub mod consts;

mod cmd;
mod config;
mod discovery;
mod host;
mod identity;
mod kvstore;
mod ledger;
mod provision;
mod reconcile;
mod relation;
mod types;

#[cfg(test)]
mod tests;
