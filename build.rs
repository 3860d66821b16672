// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packagers can pin the version explicitly
    let version = if let Ok(v) = std::env::var("CAMERA_SEGMENTS_VERSION") {
        v
    } else {
        get_git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    let described = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        // Not a checkout (crate tarball, sandboxed build)
        _ => return env!("CARGO_PKG_VERSION").to_string(),
    };

    let described = described.strip_prefix('v').unwrap_or(&described);

    // "0.1.0-5-gabcdef1" (commits after a tag) becomes "0.1.0-dirty-abcdef1"
    if described.contains('-') {
        let parts: Vec<&str> = described.rsplitn(3, '-').collect();
        if parts.len() >= 3 {
            let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
            return format!("{}-dirty-{}", parts[2], hash);
        }
    }

    described.to_string()
}
