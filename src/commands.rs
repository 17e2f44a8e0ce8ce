use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::catalog::Catalog;
use crate::config::{mask_key, Config};
use crate::index::BookIndex;
use crate::openai::{Embedder, OpenAiClient};
use crate::rag::Librarian;
use crate::server::{router, AppState};

/// Advisory startup diagnostic: masked credential, one embedding call,
/// one minimal chat call. Prints a pass/fail line per check and returns
/// the overall verdict; never fatal to the caller.
#[inline]
pub fn run_health_check(config: &Config) -> bool {
    println!("[health] OPENAI_API_KEY: {}", mask_key(config.api_key.as_deref()));

    if config.api_key.is_none() {
        println!("[health][ERROR] OPENAI_API_KEY lipsește. Setează în .env sau în mediu.");
        return false;
    }

    let client = match OpenAiClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            println!("[health][ERROR] client setup failed: {}", e);
            return false;
        }
    };

    let mut ok = true;

    match client.embed("ping") {
        Ok(vector) => println!(
            "[health] embeddings OK (model={}, dim={})",
            client.embedding_model(),
            vector.len()
        ),
        Err(e) => {
            println!("[health][ERROR] embeddings failed: {}", e);
            ok = false;
        }
    }

    match client.chat_smoke_test() {
        Ok(()) => println!("[health] chat OK (model={})", client.chat_model()),
        Err(e) => {
            println!("[health][ERROR] chat failed: {}", e);
            ok = false;
        }
    }

    if ok {
        println!("[health] All good");
    } else {
        println!("[health] Probleme detectate — vezi mesajele de mai sus.");
    }
    ok
}

/// Interactive question loop on stdin. One bad turn prints its error and
/// the loop continues; `exit`/`quit` (case-insensitive) or EOF ends it.
#[inline]
pub async fn chat_loop(config: &Config, k: usize, rebuild: bool) -> Result<()> {
    // Advisory only; the user may still try their luck on failure.
    run_health_check(config);

    let catalog = Catalog::load(&config.catalog_path).context("Failed to load book catalog")?;
    let client = OpenAiClient::new(config).context("Failed to create provider client")?;
    let index = BookIndex::open(config)
        .await
        .context("Failed to open vector store")?;
    index
        .build_or_load(&client, &catalog, rebuild)
        .await
        .context("Failed to build vector index")?;

    println!("=== Smart Librarian (CLI) ===");
    println!("Exemple:");
    println!("- Vreau o carte despre libertate și control social.");
    println!("- Ce-mi recomanzi dacă iubesc poveștile fantastice?");
    println!("- Vreau ceva despre prietenie și magie.");
    println!("- Ce este 1984?");
    println!("Tastează 'exit' pentru a ieși.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("Întrebarea ta: ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("\nLa revedere!");
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            println!("La revedere!");
            break;
        }

        match answer_once(&client, &catalog, &index, question, k).await {
            Ok(answer) => {
                println!("\n--- Răspuns ---");
                println!("{}", answer);
                println!("---------------\n");
            }
            Err(e) => {
                error!("Chat turn failed: {}", e);
                eprintln!("Eroare: {}", e);
            }
        }
    }

    Ok(())
}

async fn answer_once(
    client: &OpenAiClient,
    catalog: &Catalog,
    index: &BookIndex,
    question: &str,
    k: usize,
) -> Result<String> {
    let retrieved = index.search(client, question, k).await?;
    let librarian = Librarian::new(client, catalog);
    Ok(librarian.answer(question, &retrieved)?)
}

/// Start the HTTP API.
#[inline]
pub async fn serve(config: Config, port: u16) -> Result<()> {
    let catalog = Catalog::load(&config.catalog_path).context("Failed to load book catalog")?;
    let client = OpenAiClient::new(&config).context("Failed to create provider client")?;

    let state = Arc::new(AppState::new(config, catalog, client));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);
    println!("Smart Librarian API pornit pe http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nLa revedere!");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
