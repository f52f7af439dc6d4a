//! Protocol types compiled from `proto/provider.proto` by the build script.

tonic::include_proto!("hemmer.provider.v1");
