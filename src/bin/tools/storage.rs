// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// The provisioning workflows: preparing devices, announcing them and
// bringing the ledger up to date with past announcements.

use std::path::Path;

use log::info;

use swift_storage::{
    engine::{
        announce_devices, consts::DEVICE_ROOT, determine_block_devices, ensure_devs_tracked,
        host_identity, load_prepared_devices, save_prepared_devices, setup_storage,
        verify_binaries, DeviceName, FileKvStore, HostProvisioner, Ledger, LinuxHost,
    },
    swift::SwiftResult,
};

use crate::tools::common::ToolContext;

/// Prepare all selected devices that are not in the ring yet and remember
/// the prepared devices in the unit state.
pub fn run_setup(ctx: &ToolContext, unit_state: &Path) -> SwiftResult<()> {
    verify_binaries()?;
    let settings = ctx.settings()?;
    let deployment = ctx.deployment()?;
    let relation = ctx.relation()?;
    let host = LinuxHost::default();

    let prepared = setup_storage(
        &settings,
        &host,
        &Ledger::new(ctx.ledger_store(), &deployment),
        &relation,
        &HostProvisioner::default(),
        Path::new(DEVICE_ROOT),
    )?;

    save_prepared_devices(&mut FileKvStore::open(unit_state)?, &prepared)?;
    for device in &prepared {
        println!("{device}");
    }
    Ok(())
}

/// Announce the prepared devices, or if no setup has run, the selected
/// devices.
pub fn run_announce(ctx: &ToolContext, unit_state: &Path) -> SwiftResult<()> {
    let deployment = ctx.deployment()?;
    let relation = ctx.relation()?;
    let host = LinuxHost::default();

    let prepared = if unit_state.exists() {
        load_prepared_devices(&FileKvStore::open(unit_state)?)?
    } else {
        None
    };
    let devices = match prepared {
        Some(devices) => devices,
        None => {
            info!("No prepared devices recorded; announcing the selected devices");
            determine_block_devices(
                &host,
                &ctx.settings()?.block_device,
                Path::new(DEVICE_ROOT),
            )?
            .iter()
            .map(|devnode| DeviceName::from_devnode(devnode))
            .collect::<SwiftResult<Vec<_>>>()?
        }
    };

    announce_devices(
        &Ledger::new(ctx.ledger_store(), &deployment),
        &relation,
        &devices,
        host_identity(&host),
    )
}

/// Add every announced device that the ledger does not know about to the
/// ledger.
pub fn run_track(ctx: &ToolContext) -> SwiftResult<()> {
    let deployment = ctx.deployment()?;
    let host = LinuxHost::default();
    for device in ensure_devs_tracked(
        &Ledger::new(ctx.ledger_store(), &deployment),
        &ctx.relation()?,
        host_identity(&host),
    )? {
        println!("{device}");
    }
    Ok(())
}
