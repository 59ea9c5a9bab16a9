// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    borrow::Borrow,
    env,
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    engine::consts::{DEVICE_SEPARATOR, DEV_DIR, ENV_UUID_VARS},
    swift::{SwiftError, SwiftResult},
};

/// The name of a block device relative to /dev, e.g. "vdb" or "cciss/c1d0".
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    pub fn new(name: String) -> SwiftResult<DeviceName> {
        if name.is_empty()
            || name.starts_with('/')
            || name
                .chars()
                .any(|c| c == '@' || c == DEVICE_SEPARATOR || c.is_whitespace())
        {
            return Err(SwiftError::Msg(format!(
                "\"{name}\" is not a valid device name"
            )));
        }
        Ok(DeviceName(name))
    }

    /// Derive the device name from a device node path. Nodes beneath /dev
    /// keep their relative path; anything else is reduced to its file name.
    pub fn from_devnode(devnode: &Path) -> SwiftResult<DeviceName> {
        let relative = match devnode.strip_prefix(DEV_DIR) {
            Ok(rel) if rel.as_os_str().is_empty() => None,
            Ok(rel) => Some(rel),
            Err(_) => devnode.file_name().map(Path::new),
        };
        relative
            .and_then(|r| r.to_str())
            .ok_or_else(|| {
                SwiftError::Msg(format!(
                    "Unable to derive a device name from {}",
                    devnode.display()
                ))
            })
            .and_then(|r| DeviceName::new(r.to_owned()))
    }

    /// The device node in /dev corresponding to this name.
    pub fn devnode(&self) -> PathBuf {
        Path::new(DEV_DIR).join(&self.0)
    }
}

impl Deref for DeviceName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceName {
    type Err = SwiftError;

    fn from_str(s: &str) -> SwiftResult<DeviceName> {
        DeviceName::new(s.to_owned())
    }
}

impl TryFrom<String> for DeviceName {
    type Error = SwiftError;

    fn try_from(s: String) -> SwiftResult<DeviceName> {
        DeviceName::new(s)
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> String {
        name.0
    }
}

/// Opaque identifier of the model (environment) a device was committed
/// under.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeploymentId(String);

impl DeploymentId {
    pub fn new(id: String) -> SwiftResult<DeploymentId> {
        if id.is_empty() {
            return Err(SwiftError::Msg(
                "A deployment identifier may not be empty".into(),
            ));
        }
        Ok(DeploymentId(id))
    }

    /// Read the deployment identity exported by the controller. Juju 1
    /// calls it JUJU_ENV_UUID, later versions JUJU_MODEL_UUID.
    pub fn from_env() -> SwiftResult<DeploymentId> {
        ENV_UUID_VARS
            .iter()
            .find_map(|var| env::var(var).ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| {
                SwiftError::Msg(format!(
                    "No deployment identity found; none of {} is set",
                    ENV_UUID_VARS.join(", ")
                ))
            })
            .map(DeploymentId)
    }
}

impl Deref for DeploymentId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one (device, deployment) pairing; rendered as
/// "<device>@<deployment>".
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerKey {
    pub device: DeviceName,
    pub deployment: DeploymentId,
}

impl LedgerKey {
    pub fn new(device: &DeviceName, deployment: &DeploymentId) -> LedgerKey {
        LedgerKey {
            device: device.clone(),
            deployment: deployment.clone(),
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.device, self.deployment)
    }
}

impl FromStr for LedgerKey {
    type Err = SwiftError;

    fn from_str(s: &str) -> SwiftResult<LedgerKey> {
        let (device, deployment) = s.split_once('@').ok_or_else(|| {
            SwiftError::Msg(format!("Ledger key \"{s}\" has no deployment part"))
        })?;
        Ok(LedgerKey {
            device: DeviceName::new(device.to_owned())?,
            deployment: DeploymentId::new(deployment.to_owned())?,
        })
    }
}

impl TryFrom<String> for LedgerKey {
    type Error = SwiftError;

    fn try_from(s: String) -> SwiftResult<LedgerKey> {
        LedgerKey::from_str(&s)
    }
}

impl From<LedgerKey> for String {
    fn from(key: LedgerKey) -> String {
        key.to_string()
    }
}

/// State of a ledger record. Nothing in this crate moves a record out of
/// Active; Deactivated is only ever produced by hand-edited ledgers.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Deserialize,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Deactivated,
}

/// What is known about a device at the moment it was committed to the ring.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DeviceRecord {
    /// Filesystem UUID, absent if the device had no filesystem.
    #[serde(default)]
    pub blkid: Option<String>,
    pub status: DeviceStatus,
}

impl DeviceRecord {
    pub fn active(blkid: Option<String>) -> DeviceRecord {
        DeviceRecord {
            blkid,
            status: DeviceStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }

    /// True only if both UUIDs are known and equal.
    pub fn has_blkid(&self, blkid: Option<&str>) -> bool {
        matches!((self.blkid.as_deref(), blkid), (Some(a), Some(b)) if a == b)
    }
}

/// Options for a ring membership query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MembershipQuery {
    /// Consult only the local ledger, never the relation data.
    pub skip_remote_check: bool,
    /// Deactivated records do not count as evidence of membership.
    pub ignore_deactivated: bool,
}

impl Default for MembershipQuery {
    fn default() -> MembershipQuery {
        MembershipQuery {
            skip_remote_check: false,
            ignore_deactivated: true,
        }
    }
}

impl MembershipQuery {
    pub fn local_only() -> MembershipQuery {
        MembershipQuery {
            skip_remote_check: true,
            ..MembershipQuery::default()
        }
    }
}
