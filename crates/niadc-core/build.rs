fn main() {
    // Reported by `niadc --version` and logged at session creation
    let now = chrono::Utc::now().format("%Y-%m-%d").to_string();
    println!("cargo:rustc-env=BUILD_DATE={}", now);
    println!("cargo:rerun-if-changed=build.rs");
}
