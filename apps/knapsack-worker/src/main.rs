use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = knapsack_worker::Args::parse();

	knapsack_worker::run(args).await
}
