use roadcode_rag_core::{ChatSession, Embedder, Generator, VectorIndex};
use std::io::{self, BufRead, Write};
use tracing::warn;

enum Input {
    Exit,
    Clear,
    History,
    Question(String),
}

fn classify(line: &str) -> Option<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(match trimmed.to_lowercase().as_str() {
        "exit" | "quit" | "bye" => Input::Exit,
        "clear" => Input::Clear,
        "history" => Input::History,
        _ => Input::Question(trimmed.to_string()),
    })
}

/// Line-oriented loop over one session. Per-question failures are printed
/// and the loop keeps going.
pub async fn run<E, V, G>(session: &mut ChatSession<E, V, G>) -> anyhow::Result<()>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    G: Generator + Send + Sync,
{
    if !session.history().is_empty() {
        println!("Loaded chat history with {} messages", session.history().len());
    }
    println!(
        "Road Users Code Chat Assistant - Type 'exit' to end, 'clear' to reset history, 'history' to show it"
    );

    let stdin = io::stdin();
    loop {
        print!("\nYour question: ");
        io::stdout().flush()?;

        let mut line = String::new();
        let input = if stdin.lock().read_line(&mut line)? == 0 {
            Input::Exit
        } else {
            match classify(&line) {
                Some(input) => input,
                None => continue,
            }
        };

        match input {
            Input::Exit => {
                println!("\nEnding chat session. Goodbye!");
                if let Err(error) = session.save_history() {
                    warn!(%error, "history was not saved");
                    println!("Warning: {error}");
                }
                return Ok(());
            }
            Input::Clear => match session.clear_history() {
                Ok(()) => println!("Conversation history cleared"),
                Err(error) => println!("Warning: {error}"),
            },
            Input::History => {
                for turn in session.history() {
                    println!("\n{turn}");
                }
            }
            Input::Question(question) => {
                println!("\nThinking...");
                match session.process_query(&question).await {
                    Ok(answer) => {
                        println!("\nAssistant: {}", answer.text);
                        if let Some(error) = answer.persist_error {
                            println!("Warning: {error}");
                        }
                    }
                    Err(error) => {
                        println!("\nError: {error}");
                        println!("Please try again with a different question.");
                    }
                }
            }
        }
    }
}
