//! Build script for optimage.
//!
//! On Windows the application manifest (`optimage.manifest`, referenced by
//! `optimage.rc`) is embedded so the binary is long-path aware. Media trees
//! of web shops nest deeply enough to exceed MAX_PATH. Other platforms need
//! nothing.

fn main() {
    #[cfg(windows)]
    {
        embed_resource::compile("optimage.rc", embed_resource::NONE);
        println!("cargo:rerun-if-changed=optimage.rc");
        println!("cargo:rerun-if-changed=optimage.manifest");
    }
}
