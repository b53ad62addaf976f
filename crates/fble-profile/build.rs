fn main() {
    prost_build::compile_protos(&["proto/profile.proto"], &["proto/"]).expect("failed to compile pprof proto schema");
    println!("cargo:rerun-if-changed=proto/profile.proto");
}
