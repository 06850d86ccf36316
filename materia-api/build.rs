//! Stamps the materia-api binary with where it came from
//!
//! `main` logs `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` once at
//! startup so a running catalog instance can be matched to its commit.

use std::env;
use std::process::Command;

/// Short commit of the checkout, or `unknown` outside a git tree
fn commit() -> String {
    let output = Command::new("git").args(["rev-parse", "--short=8", "HEAD"]).output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => "unknown".to_string(),
    }
}

fn main() {
    let stamp = [
        ("GIT_HASH", commit()),
        (
            "BUILD_TIMESTAMP",
            chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        ),
        ("BUILD_PROFILE", env::var("PROFILE").unwrap_or_else(|_| "unknown".into())),
    ];
    for (key, value) in stamp {
        println!("cargo:rustc-env={}={}", key, value);
    }
}
