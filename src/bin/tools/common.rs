// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Options and setup shared by all the tools.

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::{Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder;
use log::LevelFilter;

use swift_storage::{
    engine::{
        consts::{LEDGER_DB_PATH, UNIT_STATE_FILE},
        CharmConfig, DeploymentId, DeviceName, FileStoreProvider, JujuRelation, NodeSettings,
    },
    swift::SwiftResult,
};

const CHARM_DIR_VAR: &str = "CHARM_DIR";

/// Configure and initialize the logger.
/// With verbose, log everything down to debug. Otherwise read the log
/// configuration from RUST_LOG if it is set, or log at the severity of error
/// only.
pub fn initialize_log(verbose: bool) {
    let mut builder = Builder::new();

    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if let Ok(s) = env::var("RUST_LOG") {
        builder.parse_filters(&s);
    }

    builder.init()
}

/// Add the options every tool accepts.
pub fn with_common_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("ledger")
                .long("ledger")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(LEDGER_DB_PATH)
                .help("Location of the device ledger database"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Read the charm configuration from a JSON file instead of config-get"),
        )
        .arg(
            Arg::new("deployment_id")
                .long("deployment-id")
                .value_name("ID")
                .help("Deployment identity; defaults to JUJU_ENV_UUID or JUJU_MODEL_UUID"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Log debugging information"),
        )
}

/// The option naming the unit-local state file.
pub fn unit_state_arg() -> Arg {
    Arg::new("unit_state")
        .long("unit-state")
        .value_name("PATH")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Location of the unit-local state; defaults to a file in CHARM_DIR")
}

/// The environment a tool runs in, built from the common options.
pub struct ToolContext {
    ledger: FileStoreProvider,
    config: Option<PathBuf>,
    deployment: Option<String>,
}

impl ToolContext {
    pub fn from_matches(matches: &ArgMatches) -> ToolContext {
        initialize_log(matches.get_flag("verbose"));
        ToolContext {
            ledger: FileStoreProvider::new(
                matches
                    .get_one::<PathBuf>("ledger")
                    .expect("'ledger' has a default value"),
            ),
            config: matches.get_one::<PathBuf>("config").cloned(),
            deployment: matches.get_one::<String>("deployment_id").cloned(),
        }
    }

    pub fn ledger_store(&self) -> &FileStoreProvider {
        &self.ledger
    }

    pub fn deployment(&self) -> SwiftResult<DeploymentId> {
        match &self.deployment {
            Some(id) => DeploymentId::new(id.clone()),
            None => DeploymentId::from_env(),
        }
    }

    pub fn settings(&self) -> SwiftResult<NodeSettings> {
        let config = match &self.config {
            Some(path) => CharmConfig::from_file(path)?,
            None => CharmConfig::from_hook_tool()?,
        };
        NodeSettings::from_provider(&config)
    }

    pub fn relation(&self) -> SwiftResult<JujuRelation> {
        JujuRelation::from_env()
    }
}

/// The unit-local state file given on the command line, or the default one
/// in the charm directory.
pub fn unit_state_path(matches: &ArgMatches) -> PathBuf {
    match matches.get_one::<PathBuf>("unit_state") {
        Some(path) => path.clone(),
        None => env::var(CHARM_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(UNIT_STATE_FILE),
    }
}

/// A device given on the command line, either as a name relative to /dev
/// or as a device node.
pub fn device_name(arg: &str) -> SwiftResult<DeviceName> {
    if arg.starts_with('/') {
        DeviceName::from_devnode(Path::new(arg))
    } else {
        DeviceName::from_str(arg)
    }
}
