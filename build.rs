use vergen_gitcl::{Emitter, GitclBuilder};

fn main() {
    let gitcl = GitclBuilder::default()
        .describe(true, true, None)
        .build()
        .expect("failed to configure vergen-gitcl");

    if let Err(e) = Emitter::default().add_instructions(&gitcl).and_then(|e| e.emit()) {
        // Outside a git checkout (e.g. a crates.io source tarball) there's no
        // describe output to emit; fall back to the crate version so the binary
        // still builds.
        println!("cargo:warning=vergen-gitcl failed ({e}); using CARGO_PKG_VERSION instead");
        println!(
            "cargo:rustc-env=VERGEN_GIT_DESCRIBE={}",
            env!("CARGO_PKG_VERSION")
        );
    }
}
