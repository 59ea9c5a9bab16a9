// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Handles invoking external binaries.
// System binaries are looked up in an explicit list of directories rather
// than in the PATH, which may be unset in a hook environment. Since a binary
// may be removed while this process runs, the existence of the file is
// checked again right before it is invoked.
// Juju hook tools are the exception: they only exist on the PATH that the
// controller sets up for a hook invocation, and are invoked by name.

use std::{
    collections::HashMap,
    ffi::OsStr,
    path::{Path, PathBuf},
    process::{Command, Output},
    sync::LazyLock,
};

use crate::swift::{SwiftError, SwiftResult};

const BINARIES_PATHS: [&str; 4] = ["/usr/sbin", "/sbin", "/usr/bin", "/bin"];

/// Find the binary with the given name by looking in likely locations.
/// Return None if no binary was found.
fn find_binary(name: &str) -> Option<PathBuf> {
    BINARIES_PATHS
        .iter()
        .map(|pre| Path::new(pre).join(name))
        .find(|path| path.exists())
}

// These are the external binaries that this crate relies on.
// Any change in this list requires a corresponding change to BINARIES,
// and vice-versa.
const BLKID: &str = "blkid";
const CHMOD: &str = "chmod";
const CHOWN: &str = "chown";
const MKFS_XFS: &str = "mkfs.xfs";
const WIPEFS: &str = "wipefs";

static BINARIES: LazyLock<HashMap<String, Option<PathBuf>>> = LazyLock::new(|| {
    [BLKID, CHMOD, CHOWN, MKFS_XFS, WIPEFS]
        .iter()
        .map(|name| (name.to_string(), find_binary(name)))
        .collect()
});

// Hook tools.
const CONFIG_GET: &str = "config-get";
const RELATION_GET: &str = "relation-get";
const RELATION_IDS: &str = "relation-ids";
const RELATION_SET: &str = "relation-set";

/// Verify that all binaries that provisioning might invoke are available at
/// some path. Return an error if any are missing.
pub fn verify_binaries() -> SwiftResult<()> {
    let mut missing = BINARIES
        .iter()
        .filter(|(_, path)| path.is_none())
        .map(|(name, _)| name.to_owned())
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        Err(SwiftError::BinaryNotFound {
            names: missing,
            locations: BINARIES_PATHS.iter().map(|path| path.to_string()).collect(),
        })
    }
}

/// Run the command and collect its output. Only a failure to start the
/// command is an error; the exit status is left to the caller.
fn run_cmd(cmd: &mut Command) -> SwiftResult<Output> {
    cmd.output().map_err(|err| {
        SwiftError::Chained(
            format!("Failed to execute command {cmd:?}"),
            Box::new(SwiftError::Io(err)),
        )
    })
}

/// Invoke the specified command. Return an error if invoking the command
/// fails or if the command itself fails. Returns stdout on success.
fn execute_cmd(cmd: &mut Command) -> SwiftResult<String> {
    let output = run_cmd(cmd)?;
    if output.status.success() {
        Ok(String::from_utf8(output.stdout)?)
    } else {
        Err(SwiftError::CommandFailure {
            cmd: format!("{cmd:?}"),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Get an absolute path for the executable with the given name.
fn get_executable(name: &str) -> SwiftResult<&Path> {
    match BINARIES.get(name) {
        Some(Some(path)) if path.exists() => Ok(path.as_path()),
        _ => Err(SwiftError::BinaryNotFound {
            names: vec![name.to_owned()],
            locations: BINARIES_PATHS.iter().map(|path| path.to_string()).collect(),
        }),
    }
}

/// Run blkid to obtain the filesystem UUID of devnode.
/// blkid exits non-zero when it finds nothing to report, which is the
/// expected result for a device that has never been formatted; that case is
/// Ok(None). The returned string is the raw blkid output otherwise.
pub fn blkid_uuid(devnode: &Path) -> SwiftResult<Option<String>> {
    let output = run_cmd(
        Command::new(get_executable(BLKID)?.as_os_str())
            .arg("-s")
            .arg("UUID")
            .arg(devnode),
    )?;
    if output.status.success() {
        Ok(Some(String::from_utf8(output.stdout)?))
    } else {
        debug!(
            "blkid reported nothing for {} ({})",
            devnode.display(),
            output.status
        );
        Ok(None)
    }
}

/// Create an XFS filesystem on devnode. Without force, mkfs.xfs refuses to
/// overwrite an existing filesystem.
pub fn create_fs(devnode: &Path, force: bool) -> SwiftResult<()> {
    let mut cmd = Command::new(get_executable(MKFS_XFS)?.as_os_str());
    if force {
        cmd.arg("-f");
    }
    execute_cmd(cmd.arg("-i").arg("size=1024").arg(devnode)).map(|_| ())
}

/// Erase all signatures from devnode.
pub fn wipe_signatures(devnode: &Path) -> SwiftResult<()> {
    execute_cmd(
        Command::new(get_executable(WIPEFS)?.as_os_str())
            .arg("-a")
            .arg(devnode),
    )
    .map(|_| ())
}

/// Hand path over to owner and owner's group. With recursive, everything
/// beneath path is handed over as well.
pub fn chown(path: &Path, owner: &str, recursive: bool) -> SwiftResult<()> {
    let mut cmd = Command::new(get_executable(CHOWN)?.as_os_str());
    if recursive {
        cmd.arg("-R");
    }
    execute_cmd(cmd.arg(format!("{owner}:{owner}")).arg(path)).map(|_| ())
}

/// Set the mode of path, and with recursive of everything beneath it.
pub fn chmod(path: &Path, mode: &str, recursive: bool) -> SwiftResult<()> {
    let mut cmd = Command::new(get_executable(CHMOD)?.as_os_str());
    if recursive {
        cmd.arg("-R");
    }
    execute_cmd(cmd.arg(mode).arg(path)).map(|_| ())
}

fn hook_tool<I, S>(name: &str, args: I) -> SwiftResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    execute_cmd(Command::new(name).args(args))
}

/// The charm configuration as a JSON document.
pub fn config_get() -> SwiftResult<String> {
    hook_tool(CONFIG_GET, ["--format=json"])
}

/// Relation ids of all established relations with the given name.
pub fn relation_ids(relation: &str) -> SwiftResult<Vec<String>> {
    let out = hook_tool(RELATION_IDS, ["--format=json", relation])?;
    let ids: Option<Vec<String>> = serde_json::from_str(out.trim())?;
    Ok(ids.unwrap_or_default())
}

/// Read a single attribute of the settings the given unit published on a
/// relation. Unset attributes are None.
pub fn relation_get(rid: &str, attribute: &str, unit: &str) -> SwiftResult<Option<String>> {
    let out = hook_tool(
        RELATION_GET,
        ["--format=json", "-r", rid, attribute, unit],
    )?;
    Ok(serde_json::from_str::<Option<String>>(out.trim())?.filter(|v| !v.is_empty()))
}

/// Publish a single attribute on a relation.
pub fn relation_set(rid: &str, attribute: &str, value: &str) -> SwiftResult<()> {
    let setting = format!("{attribute}={value}");
    hook_tool(RELATION_SET, ["-r", rid, setting.as_str()]).map(|_| ())
}
