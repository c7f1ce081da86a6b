#[tokio::main]
async fn main() {
    std::process::exit(correlator::app::startup::startup().await);
}
