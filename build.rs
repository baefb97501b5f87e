const PROTOS: [&str; 2] = ["proto/common.proto", "proto/tracepoint.proto"];

fn main() {
    protobuf_codegen::Codegen::new()
        .pure()
        .includes(["proto"])
        .inputs(PROTOS)
        .cargo_out_dir("protos")
        .run_from_script();

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={}", proto);
    }
}
