// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Queries about the block devices of the host.

use std::{
    fs,
    path::{Path, PathBuf},
};

use nix::sys::stat::{stat, SFlag};
use procfs::process::Process;
use regex::Regex;

use crate::{
    engine::{cmd, consts::PROC_PARTITIONS},
    swift::SwiftResult,
};

/// The host operations that device discovery and identification depend on.
pub trait HostDevices {
    /// Names of the entries of the kernel partition table, relative to /dev.
    fn list_partitions(&self) -> SwiftResult<Vec<String>>;

    /// Resolve all symbolic links in path.
    fn canonical_path(&self, path: &Path) -> SwiftResult<PathBuf>;

    /// True if path exists and is a block special file.
    fn is_block_device(&self, path: &Path) -> bool;

    /// True if the device, or any partition on it, is mounted.
    fn is_mounted(&self, devnode: &Path) -> SwiftResult<bool>;

    /// The unique mount point of the device. None if the device is not
    /// mounted, or if it is mounted in more than one place.
    fn mount_point_of(&self, devnode: &Path) -> SwiftResult<Option<PathBuf>>;

    /// The filesystem UUID of the device. None if the device carries no
    /// filesystem.
    fn query_filesystem_uuid(&self, devnode: &Path) -> SwiftResult<Option<String>>;
}

/// Extract the device names from the contents of /proc/partitions.
pub fn parse_partitions(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let fields = line.split_whitespace().collect::<Vec<_>>();
            match fields.as_slice() {
                [major, _, _, name] if major.parse::<u32>().is_ok() => Some((*name).to_owned()),
                _ => None,
            }
        })
        .collect()
}

/// True if source names a partition of devnode, e.g. /dev/sdb1 of /dev/sdb
/// or /dev/cciss/c1d0p1 of /dev/cciss/c1d0.
pub fn is_partition_of(source: &Path, devnode: &Path) -> bool {
    match (source.to_str(), devnode.to_str()) {
        (Some(source), Some(devnode)) => source
            .strip_prefix(devnode)
            .map(|rest| {
                let digits = rest.strip_prefix('p').unwrap_or(rest);
                !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
            })
            .unwrap_or(false),
        _ => false,
    }
}

/// Extract the UUID from the output of "blkid -s UUID <devnode>".
pub fn parse_blkid_uuid(devnode: &Path, output: &str) -> SwiftResult<Option<String>> {
    let re = Regex::new(&format!(
        r#"^{}:\s+UUID="(.+)"$"#,
        regex::escape(&devnode.to_string_lossy())
    ))?;
    Ok(re
        .captures(output.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned()))
}

/// The host as seen through /proc, stat(2) and blkid.
#[derive(Debug)]
pub struct LinuxHost {
    partitions: PathBuf,
}

impl LinuxHost {
    pub fn new(partitions: &Path) -> LinuxHost {
        LinuxHost {
            partitions: partitions.to_owned(),
        }
    }

    /// Pairs of (canonical mount source, mount point) for every mount whose
    /// source is a path.
    pub fn mounts() -> SwiftResult<Vec<(PathBuf, PathBuf)>> {
        Ok(Process::myself()?
            .mountinfo()?
            .into_iter()
            .filter_map(|info| {
                info.mount_source
                    .filter(|source| source.starts_with('/'))
                    .map(|source| {
                        let source = PathBuf::from(source);
                        (fs::canonicalize(&source).unwrap_or(source), info.mount_point)
                    })
            })
            .collect())
    }
}

impl Default for LinuxHost {
    fn default() -> LinuxHost {
        LinuxHost::new(Path::new(PROC_PARTITIONS))
    }
}

impl HostDevices for LinuxHost {
    fn list_partitions(&self) -> SwiftResult<Vec<String>> {
        Ok(parse_partitions(&fs::read_to_string(&self.partitions)?))
    }

    fn canonical_path(&self, path: &Path) -> SwiftResult<PathBuf> {
        Ok(fs::canonicalize(path)?)
    }

    fn is_block_device(&self, path: &Path) -> bool {
        stat(path)
            .map(|st| SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT == SFlag::S_IFBLK)
            .unwrap_or(false)
    }

    fn is_mounted(&self, devnode: &Path) -> SwiftResult<bool> {
        Ok(LinuxHost::mounts()?
            .iter()
            .any(|(source, _)| source == devnode || is_partition_of(source, devnode)))
    }

    fn mount_point_of(&self, devnode: &Path) -> SwiftResult<Option<PathBuf>> {
        let mut points = LinuxHost::mounts()?
            .into_iter()
            .filter(|(source, _)| source == devnode)
            .map(|(_, point)| point)
            .collect::<Vec<_>>();
        if points.len() > 1 {
            info!(
                "Device {} is mounted in multiple places, ignoring",
                devnode.display()
            );
            return Ok(None);
        }
        Ok(points.pop())
    }

    fn query_filesystem_uuid(&self, devnode: &Path) -> SwiftResult<Option<String>> {
        match cmd::blkid_uuid(devnode)? {
            None => Ok(None),
            Some(output) => {
                let uuid = parse_blkid_uuid(devnode, &output)?;
                if uuid.is_none() {
                    warn!(
                        "Failed to obtain a filesystem UUID for device {} from \"{}\"",
                        devnode.display(),
                        output.trim()
                    );
                }
                Ok(uuid)
            }
        }
    }
}
