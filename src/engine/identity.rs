// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Map a configured device to its canonical device node and to the identity
// of the filesystem it carries.

use std::path::{Path, PathBuf};

use crate::engine::{consts::DEV_DIR, host::HostDevices, types::DeviceName};

/// Resolve a configured device entry to a canonical block device path.
/// A bare name such as "vdb" is taken relative to /dev. Returns None if the
/// entry does not resolve to a block device.
pub fn resolve_path(host: &dyn HostDevices, entry: &str) -> Option<PathBuf> {
    let path = if entry.starts_with('/') {
        PathBuf::from(entry)
    } else {
        Path::new(DEV_DIR).join(entry)
    };

    let canonical = match host.canonical_path(&path) {
        Ok(canonical) => canonical,
        Err(err) => {
            warn!("Unable to resolve device {}: {}", path.display(), err);
            return None;
        }
    };

    if host.is_block_device(&canonical) {
        Some(canonical)
    } else {
        warn!(
            "{} is not a block device; it will not be used for storage",
            canonical.display()
        );
        None
    }
}

/// Get the filesystem UUID of the device node, if there is one.
/// A device that has never been formatted has no UUID and a device that can
/// not be read yields no UUID either; neither is an error.
pub fn get_uuid(host: &dyn HostDevices, devnode: &Path) -> Option<String> {
    match host.query_filesystem_uuid(devnode) {
        Ok(uuid) => uuid,
        Err(err) => {
            warn!(
                "Unable to query the filesystem UUID of device {}: {}",
                devnode.display(),
                err
            );
            None
        }
    }
}

/// Identity function over device names backed by the host, suitable for
/// passing to ledger operations.
pub fn host_identity(host: &dyn HostDevices) -> impl Fn(&DeviceName) -> Option<String> + '_ {
    move |name| get_uuid(host, &name.devnode())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::engine::tests::FakeHost;

    #[test]
    fn test_resolve_bare_name() {
        let host = FakeHost::new().with_block_device("/dev/vdb");
        assert_eq!(resolve_path(&host, "vdb"), Some(PathBuf::from("/dev/vdb")));
        assert_eq!(
            resolve_path(&host, "/dev/vdb"),
            Some(PathBuf::from("/dev/vdb"))
        );
    }

    #[test]
    fn test_resolve_follows_links() {
        let host = FakeHost::new()
            .with_block_device("/dev/vdc")
            .with_link("/dev/disk/by-id/virtio-abc", "/dev/vdc");
        assert_eq!(
            resolve_path(&host, "/dev/disk/by-id/virtio-abc"),
            Some(PathBuf::from("/dev/vdc"))
        );
    }

    #[test]
    fn test_resolve_rejects_non_block_device() {
        let host = FakeHost::new().with_link("/dev/disk/by-id/dangling", "/tmp/file");
        assert_eq!(resolve_path(&host, "/dev/disk/by-id/dangling"), None);
        assert_eq!(resolve_path(&host, "vdz"), None);
    }

    #[test]
    fn test_uuid_query_failure_is_unknown() {
        let host = FakeHost::new()
            .with_block_device("/dev/vdb")
            .with_uuid("/dev/vdb", "U1")
            .with_failing_uuid_query("/dev/vdc");
        assert_eq!(get_uuid(&host, Path::new("/dev/vdb")), Some("U1".into()));
        assert_eq!(get_uuid(&host, Path::new("/dev/vdc")), None);
        assert_eq!(get_uuid(&host, Path::new("/dev/vdd")), None);

        let identity = host_identity(&host);
        assert_eq!(
            identity(&DeviceName::new("vdb".into()).unwrap()),
            Some("U1".into())
        );
    }
}
