// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Selection of the block devices to use for storage.

use std::path::{Path, PathBuf};

use itertools::Itertools;
use regex::Regex;

use crate::{
    engine::{
        consts::{DEV_DIR, DISK_NAME_PATTERNS, GUESS_DIRECTIVE},
        host::HostDevices,
        identity::resolve_path,
    },
    swift::SwiftResult,
};

/// What the "block-device" setting asks for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockDeviceDirective {
    /// No devices are to be used.
    Disabled,
    /// Detect unused disks.
    Guess,
    /// Exactly these entries, each a device name or a path.
    Explicit(Vec<String>),
}

impl BlockDeviceDirective {
    pub fn parse(value: Option<&str>) -> BlockDeviceDirective {
        match value.map(str::trim) {
            None => BlockDeviceDirective::Disabled,
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("none") => {
                BlockDeviceDirective::Disabled
            }
            Some(GUESS_DIRECTIVE) => BlockDeviceDirective::Guess,
            Some(v) => BlockDeviceDirective::Explicit(
                v.split_whitespace().map(|e| e.to_owned()).collect(),
            ),
        }
    }
}

fn disk_name_regex() -> SwiftResult<Regex> {
    Ok(Regex::new(&format!(
        "^(?:{})$",
        DISK_NAME_PATTERNS.iter().join("|")
    ))?)
}

/// Disks from the partition table whose names follow the usual naming
/// conventions. Mounted disks are left out unless include_mounted is set.
pub fn find_block_devices(
    host: &dyn HostDevices,
    include_mounted: bool,
) -> SwiftResult<Vec<PathBuf>> {
    let re = disk_name_regex()?;
    let mut found = Vec::new();
    for name in host.list_partitions()? {
        if !re.is_match(&name) {
            continue;
        }
        let devnode = Path::new(DEV_DIR).join(&name);
        if include_mounted || !host.is_mounted(&devnode)? {
            found.push(devnode);
        } else {
            debug!("Not using mounted device {}", devnode.display());
        }
    }
    Ok(found)
}

/// Unused disks, together with any disk that is mounted directly beneath
/// device_root. The latter are most likely already in the ring and are
/// included so that they are reconciled rather than overlooked.
pub fn guess_block_devices(
    host: &dyn HostDevices,
    device_root: &Path,
) -> SwiftResult<Vec<PathBuf>> {
    let mut guessed = Vec::new();
    for devnode in find_block_devices(host, true)? {
        if !host.is_mounted(&devnode)? {
            guessed.push(devnode);
            continue;
        }
        match host.mount_point_of(&devnode)? {
            Some(point) if point.starts_with(device_root) => {
                info!(
                    "Device {} is mounted at {}; including it",
                    devnode.display(),
                    point.display()
                );
                guessed.push(devnode);
            }
            _ => info!(
                "Device {} is in use elsewhere; not using it for storage",
                devnode.display()
            ),
        }
    }
    Ok(guessed)
}

/// The de-duplicated, canonical block devices selected by directive.
/// Entries that do not resolve to a block device are dropped. The order of
/// the result is not significant.
pub fn determine_block_devices(
    host: &dyn HostDevices,
    directive: &BlockDeviceDirective,
    device_root: &Path,
) -> SwiftResult<Vec<PathBuf>> {
    let entries = match directive {
        BlockDeviceDirective::Disabled => {
            info!("No storage devices specified in 'block-device' config");
            return Ok(Vec::new());
        }
        BlockDeviceDirective::Guess => guess_block_devices(host, device_root)?
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>(),
        BlockDeviceDirective::Explicit(entries) => entries.clone(),
    };

    let devices = entries
        .iter()
        .unique()
        .filter_map(|entry| resolve_path(host, entry))
        .unique()
        .collect::<Vec<_>>();
    info!(
        "Valid block devices: {}",
        devices.iter().map(|d| d.display()).join(", ")
    );
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::engine::{consts::DEVICE_ROOT, tests::FakeHost};

    use super::*;

    fn set(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    fn determine(host: &FakeHost, directive: &BlockDeviceDirective) -> HashSet<PathBuf> {
        determine_block_devices(host, directive, Path::new(DEVICE_ROOT))
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_parse_directive() {
        assert_eq!(
            BlockDeviceDirective::parse(None),
            BlockDeviceDirective::Disabled
        );
        assert_eq!(
            BlockDeviceDirective::parse(Some("")),
            BlockDeviceDirective::Disabled
        );
        assert_eq!(
            BlockDeviceDirective::parse(Some("None")),
            BlockDeviceDirective::Disabled
        );
        assert_eq!(
            BlockDeviceDirective::parse(Some("guess")),
            BlockDeviceDirective::Guess
        );
        assert_eq!(
            BlockDeviceDirective::parse(Some("vdb  /dev/vdc")),
            BlockDeviceDirective::Explicit(vec!["vdb".into(), "/dev/vdc".into()])
        );
    }

    #[test]
    fn test_find_block_devices_patterns() {
        let host = FakeHost::new()
            .with_partition("sda")
            .with_partition("sda1")
            .with_partition("vdb")
            .with_partition("xvda")
            .with_partition("cciss/c0d0")
            .with_partition("cciss/c0d0p1")
            .with_partition("loop0")
            .with_partition("dm-0");
        assert_eq!(
            find_block_devices(&host, true)
                .unwrap()
                .into_iter()
                .collect::<HashSet<_>>(),
            set(&["/dev/sda", "/dev/vdb", "/dev/cciss/c0d0"])
        );
    }

    #[test]
    fn test_find_block_devices_skips_mounted() {
        let host = FakeHost::new()
            .with_partition("sda")
            .with_partition("sda1")
            .with_partition("sdb")
            .with_mount("/dev/sda1", "/");
        assert_eq!(
            find_block_devices(&host, false)
                .unwrap()
                .into_iter()
                .collect::<HashSet<_>>(),
            set(&["/dev/sdb"])
        );
    }

    #[test]
    fn test_guess_excludes_busy_elsewhere() {
        let host = FakeHost::new()
            .with_partition("vdb")
            .with_partition("vdc")
            .with_partition("vdd")
            .with_mount("/dev/vdc", "/mnt/other")
            .with_mount("/dev/vdd", "/srv/node/vdd");
        assert_eq!(
            determine(&host, &BlockDeviceDirective::Guess),
            set(&["/dev/vdb", "/dev/vdd"])
        );
    }

    #[test]
    fn test_guess_skips_multiply_mounted() {
        let host = FakeHost::new()
            .with_partition("vdb")
            .with_mount("/dev/vdb", "/srv/node/vdb")
            .with_mount("/dev/vdb", "/mnt/vdb");
        assert!(determine(&host, &BlockDeviceDirective::Guess).is_empty());
    }

    #[test]
    fn test_guess_does_not_match_similar_root() {
        let host = FakeHost::new()
            .with_partition("vdb")
            .with_mount("/dev/vdb", "/srv/node-old/vdb");
        assert!(determine(&host, &BlockDeviceDirective::Guess).is_empty());
    }

    #[test]
    fn test_explicit_drops_bad_entries() {
        let host = FakeHost::new()
            .with_block_device("/dev/vdb")
            .with_block_device("/dev/vdc")
            .with_link("/dev/disk/by-id/virtio-c", "/dev/vdc")
            .with_link("/srv/file.img", "/srv/file.img.real");
        let directive = BlockDeviceDirective::parse(Some(
            "vdb /dev/vdb /dev/disk/by-id/virtio-c vdc vdz /srv/file.img",
        ));
        assert_eq!(determine(&host, &directive), set(&["/dev/vdb", "/dev/vdc"]));
    }

    #[test]
    fn test_disabled_is_empty() {
        let host = FakeHost::new().with_partition("vdb");
        assert!(determine(&host, &BlockDeviceDirective::Disabled).is_empty());
    }
}
