use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const SCRIPTS: &[&str] = &["CAT_S22_Root_Tool.ps1", "CAT_S22_Enhanced_Debloat.ps1"];

fn main() {
    println!("cargo:rerun-if-env-changed=FLIPKIT_EMBED_SCRIPTS_DIR");

    let dir = std::env::var("FLIPKIT_EMBED_SCRIPTS_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    let mut entries = String::new();
    if let Some(dir) = dir {
        println!("cargo:rerun-if-changed={}", dir.display());
        for name in SCRIPTS {
            let path = dir.join(name);
            if path.is_file() {
                println!("cargo:rerun-if-changed={}", path.display());
                let _ = writeln!(entries, "    ({:?}, include_str!({:?})),", name, absolute(&path));
            }
        }
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap_or_else(|_| ".".to_string()));
    let source = format!(
        "/// Script bodies compiled into the binary\npub const EMBEDDED_SCRIPTS: &[(&str, &str)] = &[\n{}];\n",
        entries
    );
    if let Err(e) = std::fs::write(out_dir.join("embedded_scripts.rs"), source) {
        panic!("failed to write embedded_scripts.rs: {e}");
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
