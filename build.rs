use std::{env, process::Command};

/// Release builds stamp the binary with the nearest tag; `SALVAGE_RELEASE_TAG`
/// wins when building outside a git checkout.
fn release_tag() -> Option<String> {
    if let Ok(tag) = env::var("SALVAGE_RELEASE_TAG") {
        return Some(tag);
    }
    let output = Command::new("git")
        .args(["describe", "--tags", "--abbrev=0"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SALVAGE_RELEASE_TAG");
    if let Some(tag) = release_tag() {
        let tag = tag.trim();
        if !tag.is_empty() {
            println!("cargo:rustc-env=GIT_TAG={tag}");
        }
    }
}
