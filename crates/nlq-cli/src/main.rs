//! # nlq: natural-language queries from the terminal
//!
//! - `nlq parse <QUERY>`: parse locally and print the result or a rendered query.
//! - `nlq query <QUERY>`: run against a hub and print the matching items.
//! - `nlq ingest <FILE>`: load a JSON array of records into a hub.
//! - `nlq health`: check that a hub is up.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use nlq_core::backend::{Dialect, DocumentStore, SqlJsonb};
use nlq_core::{values, NlqParser, QueryOverrides, SortDir};
use serde_json::{json, Value};
use tabled::{Table, Tabled};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Translate free-text queries into structured filters.
#[derive(Parser)]
#[command(name = "nlq", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query locally without a server.
    Parse {
        query: String,

        /// Reference time for relative dates (RFC 3339, default: now).
        #[arg(long)]
        now: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,

        #[arg(long)]
        sort_by: Option<String>,

        #[arg(long)]
        sort_dir: Option<SortDir>,

        /// Comma-separated projection.
        #[arg(long)]
        fields: Option<String>,

        /// Output shape.
        #[arg(long, value_enum, default_value_t = Output::Json)]
        dialect: Output,

        /// Collection or table used when rendering.
        #[arg(long, default_value = "items")]
        collection: String,
    },

    /// Run a query against the hub.
    Query {
        query: String,

        #[arg(long)]
        collection: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(long)]
        offset: Option<u32>,
    },

    /// Create one item per element of a JSON array file.
    Ingest {
        file: PathBuf,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Check hub health.
    Health,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    /// The parsed query itself.
    Json,
    Sql,
    Document,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "_id")]
    id: String,
    data: String,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "nlq=warn,nlq_core=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            query,
            now,
            limit,
            offset,
            sort_by,
            sort_dir,
            fields,
            dialect,
            collection,
        } => {
            let overrides = QueryOverrides {
                limit,
                offset,
                sort_by,
                sort_dir,
                fields: fields.as_deref().map(values::split_list),
                target: None,
            };
            let result = parse_now(now.as_deref())
                .and_then(|now| render(&query, now, &overrides, dialect, &collection));
            match result {
                Ok(out) => println!("{}", out),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        // Async Commands
        cmd => {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Error: failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = rt.block_on(async_main(cmd)) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>, String> {
    match raw {
        None => Ok(Utc::now()),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid --now {:?}: {}", s, e)),
    }
}

fn render(
    query: &str,
    now: DateTime<Utc>,
    overrides: &QueryOverrides,
    output: Output,
    collection: &str,
) -> Result<String, String> {
    let parsed = NlqParser::default().parse(query, now, Some(overrides));
    if !parsed.unmatched.is_empty() {
        tracing::warn!("ignored: {}", parsed.unmatched.join(" "));
    }
    let rendered = match output {
        Output::Json => serde_json::to_string_pretty(&parsed),
        Output::Sql => {
            serde_json::to_string_pretty(&SqlJsonb::default().render(&parsed, collection))
        }
        Output::Document => {
            serde_json::to_string_pretty(&DocumentStore::default().render(&parsed, collection))
        }
    };
    rendered.map_err(|e| e.to_string())
}

async fn async_main(cmd: Commands) -> Result<(), String> {
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("NLQ_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3001".to_string());
    tracing::debug!("hub at {}", base_url);

    match cmd {
        Commands::Query {
            query,
            collection,
            limit,
            offset,
        } => {
            let url = format!("{}/api/nlq/query", base_url);
            let payload = json!({
                "query": query,
                "collection": collection,
                "params": { "limit": limit, "offset": offset },
            });
            let body = post_request(&client, &url, &payload).await?;
            println!("{}", items_table(&body));
            let meta = &body["meta"];
            println!(
                "total: {}  limit: {}  offset: {}",
                meta["total"], meta["limit"], meta["offset"]
            );
        }

        Commands::Ingest { file, collection } => {
            let records = read_records(&file)?;
            let url = match collection {
                Some(c) => format!("{}/api/data?collection={}", base_url, c),
                None => format!("{}/api/data", base_url),
            };
            let mut created = 0;
            for (i, record) in records.into_iter().enumerate() {
                match post_request(&client, &url, &json!({ "data": record })).await {
                    Ok(_) => created += 1,
                    Err(e) => eprintln!("Record {}: {}", i, e),
                }
            }
            println!("Ingested {} items", created);
        }

        Commands::Health => {
            let url = format!("{}/api/health", base_url);
            let body = get_request(&client, &url).await?;
            println!("{}", serde_json::to_string_pretty(&body).map_err(|e| e.to_string())?);
        }

        Commands::Parse { .. } => {}
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<Value>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    records_from(&content)
}

fn records_from(content: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(content).map_err(|e| e.to_string())? {
        Value::Array(records) => Ok(records),
        _ => Err("expected a JSON array of objects".into()),
    }
}

fn items_table(body: &Value) -> String {
    let rows: Vec<ItemRow> = body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| ItemRow {
                    id: item["_id"].as_str().unwrap_or_default().to_string(),
                    data: item["data"].to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    Table::new(rows).to_string()
}

/// Non-2xx answers become errors carrying the hub's `error` message.
async fn into_json(resp: reqwest::Response) -> Result<Value, String> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        Ok(body)
    } else {
        let message = body["error"].as_str().unwrap_or("request failed");
        Err(format!("{} ({})", message, status))
    }
}

async fn get_request(client: &reqwest::Client, url: &str) -> Result<Value, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    into_json(resp).await
}

async fn post_request(client: &reqwest::Client, url: &str, json: &Value) -> Result<Value, String> {
    let resp = client
        .post(url)
        .json(json)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    into_json(resp).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides() -> QueryOverrides {
        QueryOverrides::default()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_now() {
        let now = parse_now(Some("2024-03-10T00:00:00Z")).unwrap();
        assert_eq!(now.to_rfc3339(), "2024-03-10T00:00:00+00:00");
        assert!(parse_now(Some("yesterday")).is_err());
    }

    #[test]
    fn test_render_outputs() {
        let now = parse_now(Some("2024-03-10T00:00:00Z")).unwrap();

        let json_out =
            render("top 3 status is open", now, &overrides(), Output::Json, "items").unwrap();
        let parsed: Value = serde_json::from_str(&json_out).unwrap();
        assert_eq!(parsed["options"]["limit"], 3);
        assert_eq!(parsed["filter"]["status"]["value"], "open");

        let sql_out = render("status is open", now, &overrides(), Output::Sql, "tickets").unwrap();
        let sql: Value = serde_json::from_str(&sql_out).unwrap();
        assert!(sql["sql"].as_str().unwrap().starts_with("SELECT * FROM \"tickets\""));

        let doc_out =
            render("status is open", now, &overrides(), Output::Document, "tickets").unwrap();
        let doc: Value = serde_json::from_str(&doc_out).unwrap();
        assert_eq!(doc["filter"]["status"]["$eq"], "open");
    }

    #[test]
    fn test_render_applies_overrides() {
        let now = Utc::now();
        let overrides = QueryOverrides {
            limit: Some(7),
            fields: Some(values::split_list("a, b,a")),
            ..Default::default()
        };
        let out = render("top 2", now, &overrides, Output::Json, "items").unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["options"]["limit"], 7);
        assert_eq!(parsed["options"]["fields"], json!(["a", "b"]));
    }

    #[test]
    fn test_records_from() {
        assert_eq!(records_from(r#"[{"a":1}]"#).unwrap(), vec![json!({ "a": 1 })]);
        assert!(records_from(r#"{"a":1}"#).is_err());
        assert!(records_from("nope").is_err());
    }

    #[test]
    fn test_items_table() {
        let body = json!({ "items": [{ "_id": "abc", "data": { "name": "Ada" } }] });
        let table = items_table(&body);
        assert!(table.contains("_id"));
        assert!(table.contains("abc"));
        assert!(table.contains(r#"{"name":"Ada"}"#));
    }
}
