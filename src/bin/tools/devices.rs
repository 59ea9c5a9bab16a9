// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use swift_storage::{
    engine::{
        consts::DEVICE_ROOT, determine_block_devices, host_identity, DeviceLedger, DeviceName,
        Ledger, LinuxHost, MembershipQuery, PeerRelation, StoreProvider,
    },
    swift::SwiftResult,
};

use crate::tools::common::{device_name, ToolContext};

/// Stands in for the storage relation when it must not be consulted, so
/// that a ledger-only query works outside of a hook context.
struct NoRelation;

impl PeerRelation for NoRelation {
    fn outbound_device_announcement(&self) -> SwiftResult<Option<String>> {
        Ok(None)
    }

    fn set_outbound_device_announcement(&self, _: &[DeviceName]) -> SwiftResult<()> {
        Ok(())
    }
}

/// Print the devices selected by the block-device setting.
pub fn run_devices(ctx: &ToolContext) -> SwiftResult<()> {
    let settings = ctx.settings()?;
    let host = LinuxHost::default();
    for devnode in determine_block_devices(&host, &settings.block_device, Path::new(DEVICE_ROOT))? {
        println!("{}", devnode.display());
    }
    Ok(())
}

/// Print the ledger as JSON. A ledger that does not exist yet is empty.
pub fn run_ledger(ctx: &ToolContext) -> SwiftResult<()> {
    let store = ctx.ledger_store();
    let ledger = if store.path().exists() {
        DeviceLedger::load(&store.open()?)?
    } else {
        DeviceLedger::default()
    };
    println!("{}", serde_json::to_string_pretty(&ledger)?);
    Ok(())
}

/// Print whether the device is in the ring.
pub fn run_in_ring(
    ctx: &ToolContext,
    device: &str,
    skip_relation_check: bool,
    include_deactivated: bool,
) -> SwiftResult<()> {
    let device = device_name(device)?;
    let deployment = ctx.deployment()?;
    let ledger = Ledger::new(ctx.ledger_store(), &deployment);
    let host = LinuxHost::default();
    let query = MembershipQuery {
        skip_remote_check: skip_relation_check,
        ignore_deactivated: !include_deactivated,
    };

    let committed = if skip_relation_check {
        ledger.is_committed(&device, host_identity(&host), &NoRelation, query)?
    } else {
        ledger.is_committed(&device, host_identity(&host), &ctx.relation()?, query)?
    };
    println!("{committed}");
    Ok(())
}

/// Record the devices in the ledger.
pub fn run_remember(ctx: &ToolContext, devices: &[String]) -> SwiftResult<()> {
    let devices = devices
        .iter()
        .map(|d| device_name(d))
        .collect::<SwiftResult<Vec<_>>>()?;
    let deployment = ctx.deployment()?;
    let host = LinuxHost::default();
    Ledger::new(ctx.ledger_store(), &deployment).record(&devices, host_identity(&host))?;
    Ok(())
}
