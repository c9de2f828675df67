//! A small command-line harness for exercising `daemonic_cache` outside
//! of its unit tests, in the spirit of `rls`'s own `--cli` mode
//! (`rls::cmd::run`): not a production build daemon, just enough of a
//! front end to demonstrate the library end to end.

use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;

use daemonic_cache::{BuildFileManifest, CellDescriptor, DaemonicCellState, RawTargetNode};

fn main() {
    let exit_code = main_inner();
    std::process::exit(exit_code);
}

fn main_inner() -> i32 {
    env_logger::init();

    match env::args().nth(1).as_deref() {
        Some("--version") | Some("-V") => {
            println!("daemonic-cache {}", daemonic_cache::version());
            0
        }
        Some("--help") | Some("-h") | None => {
            println!("{}", help());
            0
        }
        Some("demo") => {
            run_demo();
            0
        }
        Some(other) => {
            eprintln!("unrecognized argument: {}", other);
            eprintln!("{}", help());
            1
        }
    }
}

fn help() -> &'static str {
    "daemonic-cache-cli: exercise the DaemonicCellState cache/invalidation engine\n\n\
     Usage:\n  \
     daemonic-cache-cli demo       Seed a tiny cell and invalidate a path\n  \
     daemonic-cache-cli --version  Print the crate version\n  \
     daemonic-cache-cli --help    Print this message"
}

/// Seeds a toy cell with two build files (one depending on the other's
/// auxiliary include) and reports what `invalidate_path` does.
fn run_demo() {
    let descriptor = CellDescriptor::new(Arc::<str>::from("root"), daemonic_cache::AbsPath::new("/root")).expect("valid cell descriptor");
    let state = DaemonicCellState::new(descriptor, num_cpus::get());

    let script = daemonic_cache::AbsPath::new("/root/path/to/defs.bzl");
    let build_file = daemonic_cache::AbsPath::new("/root/path/to/BUCK");

    let manifest = BuildFileManifest::new().with_target("lib", RawTargetNode::new("path/to", "rust_library"));
    let mut dependents = BTreeSet::new();
    dependents.insert(script.clone());
    state.put_build_manifest_if_absent(build_file.clone(), manifest, dependents).expect("well-formed demo manifest");

    println!("cached manifest at {}", build_file);
    println!("invalidating {} (an included script)...", script);
    let invalidated = state.invalidate_path(&script, true);
    println!("invalidated {} raw target node(s); manifest present afterwards: {}", invalidated, state.lookup_build_manifest(&build_file).is_some());
}
