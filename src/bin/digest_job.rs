//! One-off digest run: fetch, score, select, persist. Meant for cron.

use news_digest::config::DigestConfig;
use news_digest::job::DigestJob;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    news_digest::logging::init();

    let cfg = DigestConfig::load_default()?;
    let job = DigestJob::from_config(cfg)?;
    let record = job.run_once().await?;

    println!("daily digest written: {}", job.digest_path().display());
    println!(
        "items: {}, fallback_from_previous: {}",
        record.items.len(),
        record.fallback_from_previous
    );
    for note in &record.notes {
        println!("note: {note}");
    }
    Ok(())
}
