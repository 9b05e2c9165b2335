//! Generates the `connector.v1.ConnectorService` client and server.
//!
//! The messages are hand-written `prost` types in `src/proto.rs`, so no
//! `.proto` compilation (and no `protoc`) is needed at build time.

use tonic_build::manual::{Builder, Method, Service};

fn main() {
    let service = Service::builder()
        .name("ConnectorService")
        .package("connector.v1")
        .method(
            Method::builder()
                .name("prompt")
                .route_name("Prompt")
                .input_type("crate::proto::PromptRequest")
                .output_type("crate::proto::PromptResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .method(
            Method::builder()
                .name("stream_prompt")
                .route_name("StreamPrompt")
                .input_type("crate::proto::PromptRequest")
                .output_type("crate::proto::StreamChunk")
                .codec_path("tonic::codec::ProstCodec")
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new().compile(&[service]);
    println!("cargo:rerun-if-changed=build.rs");
}
