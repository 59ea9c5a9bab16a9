// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

mod tools;

use std::{env, path::Path, process};

use clap::{Arg, Command};

use swift_storage::swift::VERSION;

use crate::tools::cmds;

fn basename(path: &str) -> Option<&Path> {
    Path::new(path).file_name().map(Path::new)
}

fn command_name(arg: &str) -> Result<&str, String> {
    basename(arg)
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Unable to determine a tool name from \"{arg}\""))
}

fn main() {
    let executable_name = "swift-storage-tools";

    let args = env::args().collect::<Vec<_>>();
    let argv1 = &args[0];

    let stripped_args = if basename(argv1.as_str())
        .map(|n| n == Path::new(executable_name))
        .unwrap_or(false)
    {
        let command = Command::new(executable_name)
            .version(VERSION)
            .about("Tracks and prepares the storage devices of a Swift storage node")
            .arg(
                Arg::new("executable")
                    .required(true)
                    .value_name("EXECUTABLE")
                    .value_parser(cmds().iter().map(|x| x.name()).collect::<Vec<_>>()),
            )
            .arg_required_else_help(true);

        let truncated_args = if args.len() > 1 {
            vec![argv1, &args[1]]
        } else {
            vec![argv1]
        };

        command.get_matches_from(truncated_args);
        args[1..].to_vec()
    } else {
        args
    };

    let command_name = match command_name(&stripped_args[0]) {
        Ok(name) => name,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(c) = cmds().iter().find(|x| command_name == x.name()) {
        match c.run(stripped_args) {
            Ok(()) => {}
            Err(e) => {
                eprintln!("Error encountered: {e}");
                process::exit(1);
            }
        }
    } else {
        eprintln!("Unknown executable name {command_name}");
        process::exit(2);
    }
}
