use fairprice_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("valuation error: {err}");
        std::process::exit(1);
    }
}
