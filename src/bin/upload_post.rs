use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};

#[derive(Parser)]
#[command(
    name = "bindery-upload",
    about = "Post a document to a running Bindery server or tail a progress feed"
)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, global = true, default_value = "http://127.0.0.1:4200")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a document and print the server's summary once it completes.
    Push {
        /// Owner id sent as the X-Owner-Id header.
        #[arg(long)]
        owner: String,
        /// Document to upload.
        #[arg(long)]
        file: PathBuf,
        /// Enrichment backend ("local" or "openai").
        #[arg(long, default_value = "local")]
        backend: String,
    },
    /// Tail the owner's live progress feed until interrupted.
    Watch {
        /// Owner id sent as the X-Owner-Id header.
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let Cli { server, command } = Cli::parse();
    match command {
        Command::Push {
            owner,
            file,
            backend,
        } => push(&server, &owner, &file, &backend).await,
        Command::Watch { owner } => watch(&server, &owner).await,
    }
}

async fn push(server: &str, owner: &str, file: &Path, backend: &str) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let form = Form::new()
        .text("backend", backend.to_string())
        .part("file", Part::bytes(data).file_name(filename));

    let response = reqwest::Client::new()
        .post(format!("{server}/documents"))
        .header("X-Owner-Id", owner)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("failed to reach {server}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    println!("{body}");
    Ok(())
}

async fn watch(server: &str, owner: &str) -> Result<()> {
    let response = reqwest::Client::new()
        .get(format!("{server}/progress"))
        .header("X-Owner-Id", owner)
        .send()
        .await
        .with_context(|| format!("failed to reach {server}"))?;
    if !response.status().is_success() {
        bail!("server returned {}", response.status());
    }

    let mut stream = response.bytes_stream();
    let mut pending = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("progress stream interrupted")?;
        pending.extend_from_slice(&chunk);
        while let Some(newline) = pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim_end();
            if !trimmed.is_empty() {
                println!("{trimmed}");
            }
        }
    }
    Ok(())
}
