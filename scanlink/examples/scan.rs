//! Scan example: run a scan, print progress, save the first preview

use scanlink::{ScanClient, SessionResult};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
    
    let ip = std::env::var("SCANNER_IP").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mode = std::env::var("SCAN_MODE").unwrap_or_else(|_| "Color".to_string());
    
    let mut client = ScanClient::connect(ip, scanlink::DEFAULT_PORT).await?;
    println!("Connected!");
    
    let options = json!({"mode": mode, "resolution": 300, "source": "ADF Duplex"});
    let progress = client.progress();
    
    let result = client
        .scan_with(options.as_object().cloned().unwrap_or_default(), |event| {
            println!("{:<24} {}", event.to_string(), progress.status());
        })
        .await?;
    
    match result {
        SessionResult::Finished(outcome) if outcome.is_completed() => {
            let sides: String = client.progress().markers().iter().map(|side| side.marker()).collect();
            println!("Scan complete: {}", sides);
            
            if let Some(preview) = client.request_page(0).await? {
                preview.image().save("page-0001-preview.png")?;
                println!("Saved preview of page 1");
            }
        }
        SessionResult::Finished(outcome) => println!("Scan ended: {}", outcome),
        SessionResult::BrokenConnection => println!("Connection lost"),
    }
    
    client.finish().await?;
    
    Ok(())
}
