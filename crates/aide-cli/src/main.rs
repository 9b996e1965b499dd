use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the models the gateway can route to
    Models,

    /// Send one prompt to a model and print the reply
    Generate {
        /// Logical model id, see `aide models`
        #[arg(short, long, default_value = "claude-sonnet-4")]
        model: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        #[arg(short, long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print the stream events as they are produced
        #[arg(long)]
        stream: bool,

        /// The user message
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Models => commands::models::execute(),
        Command::Generate {
            model,
            system,
            temperature,
            max_tokens,
            stream,
            prompt,
        } => {
            commands::generate::execute(commands::generate::GenerateArgs {
                model,
                system,
                temperature,
                max_tokens,
                stream,
                prompt,
            })
            .await
        }
    }
}
