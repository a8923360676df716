//! Interactive mathematics tutor backed by Gemini.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage; the key comes from GEMINI_API_KEY or GOOGLE_API_KEY
//! tutor-chat
//!
//! # Specify a model and a configuration file
//! tutor-chat --model gemini-1.5-pro --config tutor.yaml
//!
//! # Send the instruction inline with the question instead of as a system field
//! tutor-chat --instruction-mode prefix
//!
//! # Disable colors (useful for piping output)
//! tutor-chat --no-color
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default
//! `tutorchat=warn`).

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutorchat::chat::{
    ChatCommand, PlainTextRenderer, Renderer, export_markdown, help_text, image_turn,
    parse_command, table_turn,
};
use tutorchat::{Error, Gemini, Generator, Model, Tutor, TutorArgs, TutorConfig, Turn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorchat=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (args, _) = TutorArgs::from_command_line_relaxed("tutor-chat [OPTIONS]");
    let config = match TutorConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    // A missing key stops the program before the first question.
    let client = match config.client() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("Set GEMINI_API_KEY (or pass --api-key) and try again.");
            std::process::exit(2);
        }
    };

    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut tutor = Tutor::new(client, config);
    let mut rl = DefaultEditor::new()?;

    println!("Math Tutor (model: {})", tutor.model());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                let Some(cmd) = parse_command(line) else {
                    dispatch(&mut tutor, &mut renderer, Turn::user(line)).await;
                    continue;
                };
                match cmd {
                    ChatCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ChatCommand::Clear => {
                        tutor.reset();
                        renderer.print_info("Conversation cleared.");
                    }
                    ChatCommand::Image { path, question } => match image_turn(&path, &question) {
                        Ok(turn) => dispatch(&mut tutor, &mut renderer, turn).await,
                        Err(err) => renderer.print_error(&err.to_string()),
                    },
                    ChatCommand::Csv { path, question } => match table_turn(&path, &question) {
                        Ok(turn) => dispatch(&mut tutor, &mut renderer, turn).await,
                        Err(err) => renderer.print_error(&err.to_string()),
                    },
                    ChatCommand::Retry => {
                        renderer.print_waiting();
                        match tutor.retry().await {
                            Ok(answer) => renderer.print_reply(answer.text()),
                            Err(err) => report(&mut renderer, &err),
                        }
                    }
                    ChatCommand::Instruction(instruction) => {
                        match &instruction {
                            Some(text) => {
                                renderer.print_info(&format!("Instruction set to: {text}"))
                            }
                            None => renderer.print_info("Instruction cleared."),
                        }
                        tutor.set_instruction(instruction);
                    }
                    ChatCommand::Model(model_name) => {
                        let model = model_name
                            .parse()
                            .unwrap_or_else(|_| Model::Custom(model_name.clone()));
                        tutor.set_model(model);
                        renderer.print_info(&format!("Model changed to: {}", tutor.model()));
                    }
                    ChatCommand::Export(path) => match export_markdown(tutor.session(), &path) {
                        Ok(()) => renderer.print_info(&format!("Transcript saved to {path}")),
                        Err(err) => renderer.print_error(&err.to_string()),
                    },
                    ChatCommand::History => {
                        if tutor.session().is_empty() {
                            renderer.print_info("(no messages)");
                        }
                        for turn in tutor.session() {
                            renderer.print_turn(turn);
                        }
                    }
                    ChatCommand::Stats => print_stats(&tutor),
                    ChatCommand::Help => {
                        for line in help_text().lines() {
                            println!("    {line}");
                        }
                    }
                    ChatCommand::Invalid(message) => renderer.print_error(&message),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

async fn dispatch<G: Generator>(tutor: &mut Tutor<G>, renderer: &mut dyn Renderer, turn: Turn) {
    if let Err(err) = tutor.submit(turn) {
        report(renderer, &err);
        return;
    }
    renderer.print_waiting();
    match tutor.resolve().await {
        Ok(answer) => renderer.print_reply(answer.text()),
        Err(err) => report(renderer, &err),
    }
}

fn report(renderer: &mut dyn Renderer, err: &Error) {
    renderer.print_error(&err.to_string());
    if err.as_generation().is_some_and(|err| err.is_retryable()) {
        renderer.print_info("Type /retry to ask again.");
    }
}

fn print_stats(tutor: &Tutor<Gemini>) {
    let stats = tutor.stats();
    let config = tutor.config();
    println!("    Session Statistics:");
    println!("      Model: {}", tutor.model());
    println!("      Turns: {}", stats.turn_count);
    println!(
        "      Answers: {} completed, {} failed",
        stats.completed, stats.failed
    );
    println!(
        "      Instruction mode: {}",
        tutor.generator().instruction_mode()
    );
    match tutor.instruction() {
        Some(instruction) => println!("      Instruction: {instruction}"),
        None => println!("      Instruction: (none)"),
    }
    match config.temperature {
        Some(temperature) => println!("      Temperature: {temperature:.2}"),
        None => println!("      Temperature: default"),
    }
    match config.max_output_tokens {
        Some(tokens) => println!("      Max output tokens: {tokens}"),
        None => println!("      Max output tokens: default"),
    }
}
