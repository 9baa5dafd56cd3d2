use tracing::{info, Level};
use tracing_subscriber;

use trademe_scout::run_scrape;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let pages: u32 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(1);

    info!("🏠 Trade Me Scout - Waitakere City residential listings");
    info!("==========================================");
    info!("Harvesting {pages} search page(s), then visiting each listing for detail");
    info!("");

    let listings = run_scrape(pages).await?;

    info!("\n✅ Scraped {} listings\n", listings.len());

    for (i, listing) in listings.iter().enumerate() {
        println!(
            "{}. {} ({})",
            i + 1,
            listing.details.address,
            listing.details.price_line
        );
        println!(
            "   {} bed / {} bath / {} park",
            listing.details.beds, listing.details.baths, listing.details.parks
        );
        if !listing.details.homes_estimate.is_empty() {
            println!("   HomesEstimate: {}", listing.details.homes_estimate);
        }
        println!("   ID: {}", listing.listing_id);
        println!("   Photos: {}", listing.image_urls.len());
        println!();
    }

    // Save to main JSON file
    let json = serde_json::to_string_pretty(&listings)?;
    tokio::fs::write("scraped_listings.json", json).await?;
    info!("💾 Saved all listings to scraped_listings.json");

    Ok(())
}
