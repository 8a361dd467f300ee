// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("relocate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Update a Python installation's scripts and module caches to a new prefix")
        .arg(
            flag("clear_args", "clear-args", "Clear all existing interpreter arguments")
                .short('c'),
        )
        .arg(
            Arg::new("scripts_dir")
                .short('u')
                .long("scripts-dir")
                .value_name("DIR")
                .help("Path to scripts. Set to \"auto\" for autodetection"),
        )
        .arg(
            Arg::new("prefix")
                .short('p')
                .long("prefix")
                .value_name("PATH")
                .help("Prefix to write into scripts and caches (default: absolute PATH)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .value_name("NAME")
                .action(ArgAction::Append)
                .help("Additional directory name to skip while scanning module caches"),
        )
        .arg(
            Arg::new("on_malformed")
                .long("on-malformed")
                .value_name("MODE")
                .value_parser(["ignore", "warn", "error"])
                .help("How to handle module caches that cannot be parsed"),
        )
        .arg(flag("skip_scripts", "skip-scripts", "Do not rewrite launcher scripts"))
        .arg(flag("skip_caches", "skip-caches", "Do not rewrite module caches"))
        .arg(flag("skip_symlinks", "skip-symlinks", "Do not repair local/ symlinks"))
        .arg(flag("verbose", "verbose", "Show names of updated files").short('v'))
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .required(true)
                .help("Path to the Python installation"),
        )
        .arg(
            Arg::new("extra_args")
                .value_name("ARGS")
                .num_args(0..)
                .last(true)
                .help("Additional arguments to append to the interpreter"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("relocate.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
