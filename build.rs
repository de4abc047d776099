//! Embeds build metadata logged by the controller at startup.
//!
//! `BUILD_TIMESTAMP`, `BUILD_DATETIME` and `BUILD_GIT_HASH` may be supplied by
//! the image build; otherwise they are derived here.

use std::process::Command;

fn main() {
    let now = chrono::Utc::now();

    let timestamp = std::env::var("BUILD_TIMESTAMP")
        .ok()
        .and_then(|ts| ts.parse::<i64>().ok())
        .unwrap_or_else(|| now.timestamp());
    let datetime = std::env::var("BUILD_DATETIME")
        .unwrap_or_else(|_| now.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    let git_hash = std::env::var("BUILD_GIT_HASH")
        .ok()
        .or_else(git_hash)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_TIMESTAMP={timestamp}");
    println!("cargo:rustc-env=BUILD_DATETIME={datetime}");
    println!("cargo:rustc-env=BUILD_GIT_HASH={git_hash}");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_TIMESTAMP");
    println!("cargo:rerun-if-env-changed=BUILD_DATETIME");
    println!("cargo:rerun-if-env-changed=BUILD_GIT_HASH");
}

/// Short commit hash, suffixed with `-dirty` for uncommitted changes
fn git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;

    let dirty = Command::new("git")
        .args(["diff", "--quiet"])
        .status()
        .is_ok_and(|s| !s.success());
    Some(format!("{}{}", hash.trim(), if dirty { "-dirty" } else { "" }))
}
