use aide::models::content::ContentBlock;
use aide::models::message::Message;
use aide::providers::base::{CallOptions, CallSettings, LanguageModel, Usage};
use aide::providers::factory::AideProvider;
use aide::providers::stream::StreamEvent;
use anyhow::{Context, Result};
use console::style;
use futures::StreamExt;
use std::io::{stdout, Write};

pub struct GenerateArgs {
    pub model: String,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub prompt: String,
}

pub async fn execute(args: GenerateArgs) -> Result<()> {
    let provider = AideProvider::from_env().context("Failed to configure the AIDE provider")?;
    let model = provider.language_model(&args.model)?;

    let mut prompt = Vec::new();
    if let Some(system) = args.system {
        prompt.push(Message::system(system));
    }
    prompt.push(Message::user().with_text(args.prompt));

    let options = CallOptions::new(prompt).settings(CallSettings {
        temperature: args.temperature,
        max_output_tokens: args.max_tokens,
        ..Default::default()
    });

    if args.stream {
        return print_stream(&model, options).await;
    }

    let generated = model
        .generate(options)
        .await
        .with_context(|| format!("Call to {} failed", args.model))?;

    for warning in &generated.warnings {
        eprintln!("{} {}", style("warning:").yellow(), serde_json::to_string(warning)?);
    }
    for block in &generated.result.content {
        match block {
            ContentBlock::Text { text } => println!("{}", text),
            ContentBlock::ToolCall {
                tool_name, input, ..
            } => println!("{} {}({})", style("tool call").cyan(), tool_name, input),
        }
    }
    print_summary(
        &generated.result.finish_reason.unified.to_string(),
        &generated.result.usage,
    );
    Ok(())
}

async fn print_stream<M: LanguageModel>(model: &M, options: CallOptions) -> Result<()> {
    let mut events = model.stream(options);
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::StreamStart { warnings } => {
                for warning in warnings {
                    eprintln!(
                        "{} {}",
                        style("warning:").yellow(),
                        serde_json::to_string(&warning)?
                    );
                }
            }
            StreamEvent::TextDelta { delta, .. } => {
                print!("{}", delta);
                stdout().flush()?;
            }
            StreamEvent::TextEnd { .. } => println!(),
            StreamEvent::ToolCall {
                tool_name, input, ..
            } => println!("{} {}({})", style("tool call").cyan(), tool_name, input),
            StreamEvent::Finish {
                usage,
                finish_reason,
            } => print_summary(&finish_reason.unified.to_string(), &usage),
            StreamEvent::Error { error } => anyhow::bail!(error),
            _ => {}
        }
    }
    Ok(())
}

fn print_summary(finish_reason: &str, usage: &Usage) {
    println!(
        "{}",
        style(format!(
            "finish: {}  tokens: {} in / {} out",
            finish_reason, usage.input_tokens.total, usage.output_tokens.total
        ))
        .dim()
    );
}
