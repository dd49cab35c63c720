use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

fn commit_info() -> String {
    let output = Command::new("git")
        .args(["log", "-1", "--date=short", "--format=%h %cd"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            let info = String::from_utf8_lossy(&output.stdout);
            let info = info.trim();
            if info.is_empty() {
                String::new()
            } else {
                format!(" ({info})")
            }
        }
        _ => String::new(),
    }
}

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out_dir.join("commit-info.txt"))
        .unwrap()
        .write_all(commit_info().as_bytes())
        .unwrap();
    println!("cargo:rerun-if-changed=build.rs");
}
