// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// The ledger database lives outside of any unit's own state so that a record
// of ringed devices survives destruction of the unit, the application or the
// entire model. Devices that are to be recycled must be removed from it by
// hand.
pub const LEDGER_DB_PATH: &str = "/var/lib/juju/swift_storage/charm_kvdata.db";

/// Key under which the whole device mapping is stored.
pub const LEDGER_KEY: &str = "devices";

/// Key in the unit-local store listing devices prepared by the last setup.
pub const PREPARED_DEVICES_KEY: &str = "prepared-devices";

/// Name of the unit-local store file, relative to the charm directory.
pub const UNIT_STATE_FILE: &str = ".unit-state.db";

/// Every storage device is mounted beneath this directory.
pub const DEVICE_ROOT: &str = "/srv/node";

pub const DEV_DIR: &str = "/dev";

pub const PROC_PARTITIONS: &str = "/proc/partitions";

pub const FSTAB_PATH: &str = "/etc/fstab";

/// Owner of everything beneath DEVICE_ROOT.
pub const SWIFT_USER: &str = "swift";

pub const STORAGE_RELATION: &str = "swift-storage";

/// Relation attribute holding the colon separated list of announced devices.
pub const DEVICE_ATTRIBUTE: &str = "device";

pub const DEVICE_SEPARATOR: char = ':';

/// Config directive requesting auto-detection of devices.
pub const GUESS_DIRECTIVE: &str = "guess";

/// Whole-name patterns of disks eligible for auto-detection.
pub const DISK_NAME_PATTERNS: [&str; 3] = ["sd[a-z]", "vd[a-z]", r"cciss/c[0-9]d[0-9]"];

pub const ENV_UUID_VARS: [&str; 2] = ["JUJU_ENV_UUID", "JUJU_MODEL_UUID"];
