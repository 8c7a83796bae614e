use tonic_build::manual::{Builder, Method, Service};

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    // Messages are hand-written prost structs in src/proto.rs, so only the
    // service stubs are generated here and no protoc is required.
    let service = Service::builder()
        .name("JunctionService")
        .package("junctiond")
        .method(unary("spawn", "Spawn", "FunctionData", "SpawnResponse"))
        .method(unary("remove", "Remove", "FunctionName", "RemoveResponse"))
        .method(unary("list", "List", "Empty", "FunctionList"))
        .build();

    Builder::new()
        .build_client(true)
        .build_server(true)
        .compile(&[service]);

    println!("cargo:rerun-if-changed=build.rs");
}
