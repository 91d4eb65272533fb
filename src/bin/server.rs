use clap::Parser;
use itemwire::config::Config;
use itemwire::{server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    server::run(config).await
}
