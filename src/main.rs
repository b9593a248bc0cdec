use std::panic;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use colab_client::clients::{DocServiceClient, ServiceError};
use colab_client::config::Config;
use colab_client::models::{DocumentMeta, DocumentRecord};
use colab_client::services::DocSessionService;
use colab_client::ws::{ConnectionState, SessionScope};

const USAGE: &str = "usage: colab-client [--email <email>] [--password <password>] [--doc <document-id>] [--name <title>] [--format <format>] [--role <role>]

With no --doc the client lists the documents visible to the acting user
and exits. The acting user comes from --email or the USER_EMAIL
environment variable; --password logs in against the document service
first. API_URL and WS_URL select the service endpoints.";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "colab_client=debug,info".into()
        }))
        .init();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let Some(email) = args.email.clone().or_else(|| config.user_email.clone()) else {
        eprintln!("No acting user. Pass --email or set USER_EMAIL.");
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let client = DocServiceClient::new(config.api_url.clone());

    let email = if let Some(password) = &args.password {
        match client.login(&email, password).await {
            Ok(profile) => {
                info!("Logged in as {} {}", profile.first_name, profile.last_name);
                profile.email
            }
            Err(e) => {
                error!("Login failed: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        email
    };

    let Some(doc_id) = args.doc.clone() else {
        if let Err(e) = print_document_listing(&client, &email).await {
            error!("Failed to list documents: {}", e);
            std::process::exit(1);
        }
        return;
    };

    let meta = resolve_meta(&client, &email, &doc_id, &args).await;
    run_editor(config.ws_url, meta, email).await;
}

/// Interactive editing loop: stdin lines replace the document content,
/// server echoes print the authoritative version, EOF exits.
async fn run_editor(ws_url: String, meta: DocumentMeta, email: String) {
    let scope = SessionScope::new();
    let ctx = scope.ctx();
    let mut service = DocSessionService::new(scope.ctx(), ws_url);
    let mut view = service.view();

    info!("📡 Opening {} ({}) as {}", meta.name, meta.doc_id, email);
    service.open_session(meta, &email);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    println!("Type a line to replace the document content. Ctrl-D exits.");

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let content = view
                    .borrow_and_update()
                    .as_ref()
                    .map(|session| session.content.clone());
                match content {
                    Some(content) => {
                        println!("---- document ----");
                        println!("{}", content);
                        println!("------------------");
                    }
                    None => break,
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if ctx.state() == ConnectionState::Closed {
                        warn!("Connection lost: {:?}", ctx.diagnostics());
                        break;
                    }
                    service.submit_edit(&line);
                }
                Ok(None) => {
                    info!("Input closed, exiting editor");
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
        }
    }

    service.close_session();
}

async fn print_document_listing(
    client: &DocServiceClient,
    email: &str,
) -> Result<(), ServiceError> {
    let owned = client.owned_documents(email).await?;
    let shared = client.shared_documents(email).await?;

    println!("Documents owned by {}:", email);
    print_rows(&owned);
    println!("Documents shared with {}:", email);
    print_rows(&shared);
    Ok(())
}

fn print_rows(rows: &[DocumentRecord]) {
    if rows.is_empty() {
        println!("  (none)");
        return;
    }
    for doc in rows {
        println!(
            "  {}  {}  [{}]  owner: {}",
            doc.id, doc.title, doc.format, doc.owner_email
        );
    }
}

/// Prefer the listing row for display metadata; fall back to the command
/// line when the service is unreachable or the document is not listed.
async fn resolve_meta(
    client: &DocServiceClient,
    email: &str,
    doc_id: &str,
    args: &CliArgs,
) -> DocumentMeta {
    match lookup_record(client, email, doc_id).await {
        Ok(Some(record)) => {
            let mut meta = DocumentMeta::from(record);
            meta.role = args.role.clone();
            meta
        }
        Ok(None) => {
            warn!("Document {} not in any listing for {}", doc_id, email);
            meta_from_args(doc_id, email, args)
        }
        Err(e) => {
            warn!("Could not resolve the document listing: {}", e);
            meta_from_args(doc_id, email, args)
        }
    }
}

async fn lookup_record(
    client: &DocServiceClient,
    email: &str,
    doc_id: &str,
) -> Result<Option<DocumentRecord>, ServiceError> {
    let mut rows = client.owned_documents(email).await?;
    rows.extend(client.shared_documents(email).await?);
    Ok(rows.into_iter().find(|doc| doc.id == doc_id))
}

fn meta_from_args(doc_id: &str, email: &str, args: &CliArgs) -> DocumentMeta {
    DocumentMeta {
        doc_id: doc_id.to_string(),
        name: args.name.clone().unwrap_or_else(|| doc_id.to_string()),
        format: args.format.clone().unwrap_or_else(|| "text".to_string()),
        owner_email: email.to_string(),
        role: args.role.clone(),
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    email: Option<String>,
    password: Option<String>,
    doc: Option<String>,
    name: Option<String>,
    format: Option<String>,
    role: Option<String>,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut parsed = CliArgs::default();
        while let Some(flag) = args.next() {
            let slot = match flag.as_str() {
                "--email" => &mut parsed.email,
                "--password" => &mut parsed.password,
                "--doc" => &mut parsed.doc,
                "--name" => &mut parsed.name,
                "--format" => &mut parsed.format,
                "--role" => &mut parsed.role,
                other => return Err(format!("Unknown argument: {}", other)),
            };
            match args.next() {
                Some(value) => *slot = Some(value),
                None => return Err(format!("Missing value for {}", flag)),
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        CliArgs::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_into_fields() {
        let args = parse(&["--email", "a@b.io", "--doc", "doc-1", "--role", "editor"]).unwrap();
        assert_eq!(args.email.as_deref(), Some("a@b.io"));
        assert_eq!(args.doc.as_deref(), Some("doc-1"));
        assert_eq!(args.role.as_deref(), Some("editor"));
        assert!(args.name.is_none());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse(&["--frobnicate", "x"]).is_err());
    }

    #[test]
    fn rejects_flags_without_values() {
        assert!(parse(&["--doc"]).is_err());
    }

    #[test]
    fn falls_back_to_arguments_for_metadata() {
        let args = parse(&["--name", "Board notes", "--format", "markdown"]).unwrap();
        let meta = meta_from_args("doc-9", "a@b.io", &args);
        assert_eq!(meta.doc_id, "doc-9");
        assert_eq!(meta.name, "Board notes");
        assert_eq!(meta.format, "markdown");
        assert_eq!(meta.owner_email, "a@b.io");
    }
}
