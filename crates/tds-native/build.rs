//! Emits the link directive for FreeTDS db-lib when the `freetds` feature
//! is enabled. `SYBDB_LIB_DIR` adds a search path for non-standard installs.

fn main() {
    println!("cargo:rerun-if-env-changed=SYBDB_LIB_DIR");
    if std::env::var_os("CARGO_FEATURE_FREETDS").is_none() {
        return;
    }
    if let Some(dir) = std::env::var_os("SYBDB_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir.to_string_lossy());
    } else if cfg!(target_os = "macos") {
        println!("cargo:rustc-link-search=native=/opt/homebrew/opt/freetds/lib");
        println!("cargo:rustc-link-search=native=/usr/local/opt/freetds/lib");
    }
    println!("cargo:rustc-link-lib=dylib=sybdb");
}
