// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{fs, path::Path};

use serde_json::{Map, Value};

use crate::{
    engine::{cmd, discovery::BlockDeviceDirective},
    swift::{SwiftError, SwiftResult},
};

const BLOCK_DEVICE: &str = "block-device";
const OVERWRITE: &str = "overwrite";

/// Read-only access to the charm configuration.
pub trait ConfigProvider {
    fn get_config(&self, key: &str) -> SwiftResult<Option<Value>>;
}

/// A snapshot of the charm configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CharmConfig {
    values: Map<String, Value>,
}

impl CharmConfig {
    pub fn from_json(json: &str) -> SwiftResult<CharmConfig> {
        match serde_json::from_str(json)? {
            Value::Object(values) => Ok(CharmConfig { values }),
            Value::Null => Ok(CharmConfig::default()),
            other => Err(SwiftError::Msg(format!(
                "Charm configuration must be a JSON object, found {other}"
            ))),
        }
    }

    pub fn from_file(path: &Path) -> SwiftResult<CharmConfig> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SwiftError::Chained(
                format!("Unable to read configuration file {}", path.display()),
                Box::new(SwiftError::Io(err)),
            )
        })?;
        CharmConfig::from_json(&contents)
    }

    /// The configuration of the running unit, read with config-get.
    pub fn from_hook_tool() -> SwiftResult<CharmConfig> {
        CharmConfig::from_json(&cmd::config_get()?)
    }
}

impl ConfigProvider for CharmConfig {
    fn get_config(&self, key: &str) -> SwiftResult<Option<Value>> {
        Ok(self.values.get(key).filter(|v| !v.is_null()).cloned())
    }
}

/// The settings that drive device selection and provisioning.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeSettings {
    pub block_device: BlockDeviceDirective,
    /// Wipe and force formatting of devices that are not in the ring.
    pub overwrite: bool,
}

impl NodeSettings {
    pub fn from_provider(config: &dyn ConfigProvider) -> SwiftResult<NodeSettings> {
        let block_device = match config.get_config(BLOCK_DEVICE)? {
            None => BlockDeviceDirective::Disabled,
            Some(Value::String(s)) => BlockDeviceDirective::parse(Some(&s)),
            Some(other) => {
                return Err(SwiftError::Msg(format!(
                    "Option '{BLOCK_DEVICE}' must be a string, found {other}"
                )))
            }
        };

        let overwrite = match config.get_config(OVERWRITE)? {
            None => false,
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            Some(other) => {
                return Err(SwiftError::Msg(format!(
                    "Option '{OVERWRITE}' must be a boolean, found {other}"
                )))
            }
        };

        Ok(NodeSettings {
            block_device,
            overwrite,
        })
    }
}
