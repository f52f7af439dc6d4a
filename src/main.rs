use hemmer_provider_veeam::{init_logging, serve, VeeamProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(VeeamProvider::new()).await
}
