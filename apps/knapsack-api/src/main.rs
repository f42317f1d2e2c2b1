use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = knapsack_api::Args::parse();

	knapsack_api::run(args).await
}
