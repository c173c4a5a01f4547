//! Example demonstrating keyed reads and writes.
//!
//! Several components store their settings under separate keys of one file.
//!
//! Run with: cargo run --example read_write

use configio::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServerConfig {
    host: String,
    port: u16,
}

impl Keyed for ServerConfig {
    fn key(&self) -> &str {
        "server"
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseConfig {
    url: String,
    max_connections: u32,
}

impl Keyed for DatabaseConfig {
    fn key(&self) -> &str {
        "database"
    }
}

fn save_defaults(writer: &impl ConfigWriter) -> Result<()> {
    writer.marshal(&ServerConfig {
        host: "0.0.0.0".to_string(),
        port: 8080,
    })?;
    writer.marshal(&DatabaseConfig {
        url: "postgresql://localhost/app".to_string(),
        max_connections: 16,
    })
}

fn load_server(reader: &impl ConfigReader) -> Result<ServerConfig> {
    let mut server = ServerConfig::default();
    reader.unmarshal(&mut server)?;
    Ok(server)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Read/Write Example ===\n");

    let path = std::env::temp_dir().join("configio-example/config.json");
    let manager = ConfigManager::builder()
        .with_file(&path)
        .with_watch(false)
        .build()
        .await?;

    save_defaults(&manager)?;

    let server = load_server(&manager)?;
    println!("Server: {}:{}", server.host, server.port);

    let database: DatabaseConfig = manager.get("database")?;
    println!("Database: {} ({} connections)", database.url, database.max_connections);

    println!("\nOn disk ({}):", path.display());
    println!("{}", std::fs::read_to_string(&path)?);

    println!("\n=== Example Complete ===");
    Ok(())
}
