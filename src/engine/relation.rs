// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::env;

use itertools::Itertools;

use crate::{
    engine::{
        cmd,
        consts::{DEVICE_ATTRIBUTE, DEVICE_SEPARATOR, STORAGE_RELATION},
        reconcile::PeerRelation,
        types::DeviceName,
    },
    swift::{SwiftError, SwiftResult},
};

const UNIT_NAME_VAR: &str = "JUJU_UNIT_NAME";

/// This unit's side of the storage relation, accessed through the Juju hook
/// tools.
#[derive(Clone, Debug)]
pub struct JujuRelation {
    relation: String,
    unit: String,
}

impl JujuRelation {
    pub fn new(relation: &str, unit: &str) -> JujuRelation {
        JujuRelation {
            relation: relation.to_owned(),
            unit: unit.to_owned(),
        }
    }

    /// The storage relation of the unit running the current hook.
    pub fn from_env() -> SwiftResult<JujuRelation> {
        let unit = env::var(UNIT_NAME_VAR).map_err(|_| {
            SwiftError::Msg(format!(
                "{UNIT_NAME_VAR} is not set; relation data is only available in a hook context"
            ))
        })?;
        Ok(JujuRelation::new(STORAGE_RELATION, &unit))
    }

    /// Render devices as the value of the device attribute.
    pub fn format_announcement(devices: &[DeviceName]) -> String {
        devices.iter().join(&DEVICE_SEPARATOR.to_string())
    }
}

impl PeerRelation for JujuRelation {
    fn outbound_device_announcement(&self) -> SwiftResult<Option<String>> {
        let mut announced = Vec::new();
        for rid in cmd::relation_ids(&self.relation)? {
            if let Some(devices) = cmd::relation_get(&rid, DEVICE_ATTRIBUTE, &self.unit)? {
                announced.push(devices);
            }
        }
        if announced.is_empty() {
            Ok(None)
        } else {
            Ok(Some(announced.join(&DEVICE_SEPARATOR.to_string())))
        }
    }

    fn set_outbound_device_announcement(&self, devices: &[DeviceName]) -> SwiftResult<()> {
        let rids = cmd::relation_ids(&self.relation)?;
        if rids.is_empty() {
            info!(
                "No {} relation established; not announcing any devices",
                self.relation
            );
            return Ok(());
        }
        let value = JujuRelation::format_announcement(devices);
        for rid in rids {
            cmd::relation_set(&rid, DEVICE_ATTRIBUTE, &value)?;
        }
        Ok(())
    }
}
