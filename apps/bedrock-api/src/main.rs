use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = bedrock_api::Args::parse();

	bedrock_api::run(args).await
}
