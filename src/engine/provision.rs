// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Preparation of storage devices: formatting, mounting and handing them to
//! the swift user. A device that is already in the ring is never touched.

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use nix::mount::{mount, umount, MsFlags};

use crate::{
    engine::{
        cmd,
        config::NodeSettings,
        consts::{FSTAB_PATH, PREPARED_DEVICES_KEY, SWIFT_USER},
        discovery::determine_block_devices,
        host::{is_partition_of, HostDevices, LinuxHost},
        identity::host_identity,
        kvstore::{KvStore, StoreProvider},
        ledger::Ledger,
        reconcile::PeerRelation,
        types::{DeviceName, MembershipQuery},
    },
    swift::SwiftResult,
};

const FILESYSTEM: &str = "xfs";
const MOUNT_MODE: &str = "0755";

/// The destructive operations of device preparation.
pub trait DeviceProvisioner {
    /// Create the directory beneath which devices are mounted.
    fn ensure_device_root(&self, root: &Path) -> SwiftResult<()>;

    /// Unmount the device and erase all signatures from it.
    fn clean(&self, devnode: &Path) -> SwiftResult<()>;

    /// Create a filesystem on the device. Without force this fails if the
    /// device already carries a filesystem.
    fn format(&self, devnode: &Path, force: bool) -> SwiftResult<()>;

    /// Mount a freshly formatted device persistently at mount_point.
    fn mount(&self, devnode: &Path, mount_point: &Path) -> SwiftResult<()>;
}

/// An entry of /etc/fstab.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FstabEntry {
    pub device: String,
    pub mount_point: String,
    pub filesystem: String,
    pub options: String,
    pub dump: u32,
    pub pass: u32,
}

impl FstabEntry {
    pub fn new(device: &Path, mount_point: &Path, filesystem: &str) -> FstabEntry {
        FstabEntry {
            device: device.to_string_lossy().into_owned(),
            mount_point: mount_point.to_string_lossy().into_owned(),
            filesystem: filesystem.to_owned(),
            options: "defaults".to_owned(),
            dump: 0,
            pass: 0,
        }
    }

    fn parse(line: &str) -> Option<FstabEntry> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let fields = line.split_whitespace().collect::<Vec<_>>();
        match fields.as_slice() {
            [device, mount_point, filesystem, rest @ ..] => Some(FstabEntry {
                device: (*device).to_owned(),
                mount_point: (*mount_point).to_owned(),
                filesystem: (*filesystem).to_owned(),
                options: rest.first().copied().unwrap_or("defaults").to_owned(),
                dump: rest.get(1).and_then(|d| d.parse().ok()).unwrap_or(0),
                pass: rest.get(2).and_then(|p| p.parse().ok()).unwrap_or(0),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for FstabEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.device, self.mount_point, self.filesystem, self.options, self.dump, self.pass
        )
    }
}

pub fn parse_fstab(contents: &str) -> Vec<FstabEntry> {
    contents.lines().filter_map(FstabEntry::parse).collect()
}

/// Append entry to the fstab at path unless an entry for the same device or
/// mount point is present. Returns true if the entry was added.
pub fn add_fstab_entry(path: &Path, entry: &FstabEntry) -> SwiftResult<bool> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err.into()),
    };

    if parse_fstab(&contents)
        .iter()
        .any(|e| e.device == entry.device || e.mount_point == entry.mount_point)
    {
        debug!(
            "{} already has an entry for {} or {}",
            path.display(),
            entry.device,
            entry.mount_point
        );
        return Ok(false);
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{entry}")?;
    Ok(true)
}

/// Prepares devices on the running host.
#[derive(Debug)]
pub struct HostProvisioner {
    fstab: PathBuf,
}

impl HostProvisioner {
    pub fn new(fstab: &Path) -> HostProvisioner {
        HostProvisioner {
            fstab: fstab.to_owned(),
        }
    }
}

impl Default for HostProvisioner {
    fn default() -> HostProvisioner {
        HostProvisioner::new(Path::new(FSTAB_PATH))
    }
}

impl DeviceProvisioner for HostProvisioner {
    fn ensure_device_root(&self, root: &Path) -> SwiftResult<()> {
        fs::create_dir_all(root)?;
        // Only the root itself; devices beneath it keep their ownership.
        cmd::chown(root, SWIFT_USER, false)?;
        cmd::chmod(root, MOUNT_MODE, false)
    }

    fn clean(&self, devnode: &Path) -> SwiftResult<()> {
        for (source, point) in LinuxHost::mounts()? {
            if source == devnode || is_partition_of(&source, devnode) {
                info!("Unmounting {} from {}", source.display(), point.display());
                umount(&point)?;
            }
        }
        info!("Erasing signatures from {}", devnode.display());
        cmd::wipe_signatures(devnode)
    }

    fn format(&self, devnode: &Path, force: bool) -> SwiftResult<()> {
        info!("Creating {} filesystem on {}", FILESYSTEM, devnode.display());
        cmd::create_fs(devnode, force)
    }

    fn mount(&self, devnode: &Path, mount_point: &Path) -> SwiftResult<()> {
        fs::create_dir_all(mount_point)?;
        mount(
            Some(devnode),
            mount_point,
            Some(FILESYSTEM),
            MsFlags::empty(),
            None::<&str>,
        )?;
        if add_fstab_entry(&self.fstab, &FstabEntry::new(devnode, mount_point, FILESYSTEM))? {
            info!(
                "Added {} to {}",
                mount_point.display(),
                self.fstab.display()
            );
        }
        cmd::chown(mount_point, SWIFT_USER, true)?;
        cmd::chmod(mount_point, MOUNT_MODE, true)
    }
}

/// Prepare every selected device that is not yet in the ring and return the
/// names of all devices that are ready for use, including those that were
/// already in the ring.
///
/// A device that fails to format is skipped. Any failure to consult the
/// ledger or the relation aborts the whole run before anything further is
/// formatted.
pub fn setup_storage<P, R>(
    settings: &NodeSettings,
    host: &dyn HostDevices,
    ledger: &Ledger<'_, P>,
    relation: &R,
    provisioner: &dyn DeviceProvisioner,
    device_root: &Path,
) -> SwiftResult<Vec<DeviceName>>
where
    P: StoreProvider,
    R: PeerRelation + ?Sized,
{
    provisioner.ensure_device_root(device_root)?;

    let identity = host_identity(host);
    let mut prepared = Vec::new();
    for devnode in determine_block_devices(host, &settings.block_device, device_root)? {
        let name = DeviceName::from_devnode(&devnode)?;
        if ledger.is_committed(&name, &identity, relation, MembershipQuery::default())? {
            info!(
                "Device {} is already in the ring; leaving it untouched",
                devnode.display()
            );
            prepared.push(name);
            continue;
        }

        if settings.overwrite {
            provisioner.clean(&devnode)?;
        }

        if let Err(err) = provisioner.format(&devnode, settings.overwrite) {
            warn!(
                "Formatting device {} failed ({}); continuing with the next device",
                devnode.display(),
                err
            );
            continue;
        }

        provisioner.mount(&devnode, &device_root.join(&*name))?;
        prepared.push(name);
    }
    Ok(prepared)
}

/// Remember the devices prepared by the last setup.
pub fn save_prepared_devices<S: KvStore>(store: &mut S, devices: &[DeviceName]) -> SwiftResult<()> {
    store.set(PREPARED_DEVICES_KEY, &serde_json::to_vec(devices)?)?;
    store.flush()
}

/// The devices prepared by the last setup, if a setup has run. Entries
/// may be device names or device nodes.
pub fn load_prepared_devices<S: KvStore>(store: &S) -> SwiftResult<Option<Vec<DeviceName>>> {
    match store.get(PREPARED_DEVICES_KEY)? {
        Some(blob) => serde_json::from_slice::<Vec<String>>(&blob)?
            .into_iter()
            .map(|entry| {
                if entry.starts_with('/') {
                    DeviceName::from_devnode(Path::new(&entry))
                } else {
                    DeviceName::new(entry)
                }
            })
            .collect::<SwiftResult<Vec<_>>>()
            .map(Some),
        None => Ok(None),
    }
}
