// ABOUTME: Build script generating tonic client and server stubs for the hub protocol.
// ABOUTME: Uses tonic-build's manual service builder so no protoc binary is required.

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "modhub.v1";
const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path(CODEC)
        .build()
}

fn main() {
    // Implemented by every module; called by the hub.
    let module_service = Service::builder()
        .name("ModuleService")
        .package(PACKAGE)
        .method(unary(
            "get_widgets",
            "GetWidgets",
            "crate::v1::Empty",
            "crate::v1::WidgetList",
        ))
        .method(unary(
            "get_info",
            "GetInfo",
            "crate::v1::Empty",
            "crate::v1::ModuleInfo",
        ))
        .method(unary(
            "execute",
            "Execute",
            "crate::v1::ExecuteRequest",
            "crate::v1::ExecuteResponse",
        ))
        .build();

    // Implemented by the hub; called by modules.
    let hub_service = Service::builder()
        .name("HubService")
        .package(PACKAGE)
        .method(unary(
            "register",
            "Register",
            "crate::v1::RegisterRequest",
            "crate::v1::RegisterResponse",
        ))
        .method(unary(
            "notify",
            "Notify",
            "crate::v1::NotifyRequest",
            "crate::v1::NotifyResponse",
        ))
        .method(unary(
            "log",
            "Log",
            "crate::v1::LogRequest",
            "crate::v1::LogResponse",
        ))
        .method(unary(
            "get_system_info",
            "GetSystemInfo",
            "crate::v1::Empty",
            "crate::v1::SystemInfoResponse",
        ))
        .build();

    Builder::new()
        .build_client(true)
        .build_server(true)
        .compile(&[module_service, hub_service]);

    // The message types live in src/v1.rs and mirror proto/modhub.proto
    println!("cargo:rerun-if-changed=build.rs");
}
