// Default pool capacity, overridable per build:
//   PULP_TIMELINE_MAX_NODES=16 cargo build
// Slot indices and generations share one u16 handle, so 255 is the ceiling.

use std::env;
use std::fs;
use std::path::PathBuf;

const ENV_KEY: &str = "PULP_TIMELINE_MAX_NODES";
const DEFAULT_MAX_NODES: usize = 64;

fn main() {
    println!("cargo:rerun-if-env-changed={ENV_KEY}");
    println!("cargo:rerun-if-changed=build.rs");

    let max_nodes = match env::var(ENV_KEY) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if (1..=255).contains(&n) => n,
            Ok(n) => panic!("{ENV_KEY}={n} out of range, must be 1..=255"),
            Err(e) => panic!("{ENV_KEY}={raw:?} is not a number: {e}"),
        },
        Err(_) => DEFAULT_MAX_NODES,
    };

    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR set by cargo"));
    let src = format!(
        "/// Default pool capacity (`{ENV_KEY}`, 1..=255).\n\
         pub const MAX_NODES: usize = {max_nodes};\n"
    );
    fs::write(out.join("config.rs"), src).expect("write config.rs");
}
