// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{Arg, ArgAction, Command};

use swift_storage::swift::VERSION;

use crate::tools::{
    common::{unit_state_arg, unit_state_path, with_common_args, ToolContext},
    devices, storage,
};

pub trait ToolCommand<'a> {
    fn name(&self) -> &'a str;
    fn run(&self, command_line_args: Vec<String>) -> Result<(), String>;
}

struct SwiftStorageDevices;

impl SwiftStorageDevices {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-devices")
                .version(VERSION)
                .about("Lists the block devices selected for storage by the block-device option")
                .next_line_help(true),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageDevices {
    fn name(&self) -> &'a str {
        "swift-storage-devices"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageDevices::cmd().get_matches_from(command_line_args);
        devices::run_devices(&ToolContext::from_matches(&matches)).map_err(|err| format!("{err}"))
    }
}

struct SwiftStorageLedger;

impl SwiftStorageLedger {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-ledger")
                .version(VERSION)
                .about("Prints the device ledger as JSON")
                .next_line_help(true),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageLedger {
    fn name(&self) -> &'a str {
        "swift-storage-ledger"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageLedger::cmd().get_matches_from(command_line_args);
        devices::run_ledger(&ToolContext::from_matches(&matches)).map_err(|err| format!("{err}"))
    }
}

struct SwiftStorageInRing;

impl SwiftStorageInRing {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-in-ring")
                .version(VERSION)
                .about("Reports whether a device has been added to the ring")
                .next_line_help(true)
                .arg(
                    Arg::new("device")
                        .required(true)
                        .help("Device name relative to /dev, or a device node"),
                )
                .arg(
                    Arg::new("skip_relation_check")
                        .long("skip-relation-check")
                        .action(ArgAction::SetTrue)
                        .help("Only consult the ledger, never the storage relation"),
                )
                .arg(
                    Arg::new("include_deactivated")
                        .long("include-deactivated")
                        .action(ArgAction::SetTrue)
                        .help("Count deactivated ledger records as evidence of membership"),
                ),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageInRing {
    fn name(&self) -> &'a str {
        "swift-storage-in-ring"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageInRing::cmd().get_matches_from(command_line_args);
        let device = matches
            .get_one::<String>("device")
            .expect("'device' is a mandatory argument");
        devices::run_in_ring(
            &ToolContext::from_matches(&matches),
            device,
            matches.get_flag("skip_relation_check"),
            matches.get_flag("include_deactivated"),
        )
        .map_err(|err| format!("{err}"))
    }
}

struct SwiftStorageRemember;

impl SwiftStorageRemember {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-remember")
                .version(VERSION)
                .about("Records devices in the ledger as added to the ring")
                .next_line_help(true)
                .arg(
                    Arg::new("devices")
                        .action(ArgAction::Append)
                        .required(true)
                        .help("Device names relative to /dev, or device nodes"),
                ),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageRemember {
    fn name(&self) -> &'a str {
        "swift-storage-remember"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageRemember::cmd().get_matches_from(command_line_args);
        let devices = matches
            .get_many::<String>("devices")
            .expect("'devices' is a mandatory argument")
            .cloned()
            .collect::<Vec<_>>();
        devices::run_remember(&ToolContext::from_matches(&matches), &devices)
            .map_err(|err| format!("{err}"))
    }
}

struct SwiftStorageSetup;

impl SwiftStorageSetup {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-setup")
                .version(VERSION)
                .about("Formats and mounts every selected device that is not in the ring yet")
                .next_line_help(true)
                .arg(unit_state_arg()),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageSetup {
    fn name(&self) -> &'a str {
        "swift-storage-setup"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageSetup::cmd().get_matches_from(command_line_args);
        storage::run_setup(
            &ToolContext::from_matches(&matches),
            &unit_state_path(&matches),
        )
        .map_err(|err| format!("{err}"))
    }
}

struct SwiftStorageAnnounce;

impl SwiftStorageAnnounce {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-announce")
                .version(VERSION)
                .about("Records the prepared devices in the ledger and announces them to the proxy")
                .next_line_help(true)
                .arg(unit_state_arg()),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageAnnounce {
    fn name(&self) -> &'a str {
        "swift-storage-announce"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageAnnounce::cmd().get_matches_from(command_line_args);
        storage::run_announce(
            &ToolContext::from_matches(&matches),
            &unit_state_path(&matches),
        )
        .map_err(|err| format!("{err}"))
    }
}

struct SwiftStorageTrack;

impl SwiftStorageTrack {
    fn cmd() -> Command {
        with_common_args(
            Command::new("swift-storage-track")
                .version(VERSION)
                .about("Adds every announced device that is missing from the ledger to the ledger")
                .next_line_help(true),
        )
    }
}

impl<'a> ToolCommand<'a> for SwiftStorageTrack {
    fn name(&self) -> &'a str {
        "swift-storage-track"
    }

    fn run(&self, command_line_args: Vec<String>) -> Result<(), String> {
        let matches = SwiftStorageTrack::cmd().get_matches_from(command_line_args);
        storage::run_track(&ToolContext::from_matches(&matches)).map_err(|err| format!("{err}"))
    }
}

pub fn cmds<'a>() -> Vec<Box<dyn ToolCommand<'a>>> {
    vec![
        Box::new(SwiftStorageAnnounce),
        Box::new(SwiftStorageDevices),
        Box::new(SwiftStorageInRing),
        Box::new(SwiftStorageLedger),
        Box::new(SwiftStorageRemember),
        Box::new(SwiftStorageSetup),
        Box::new(SwiftStorageTrack),
    ]
}
