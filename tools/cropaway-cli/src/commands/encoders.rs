//! Show the encoder negotiated for each codec family.

use cropaway_common::config::AppConfig;
use cropaway_render_engine::{CodecFamily, ExportPipeline};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let pipeline = ExportPipeline::new(&config.export);
    let negotiator = pipeline.negotiator();

    println!("Cropaway Encoders");
    println!("{}", "=".repeat(50));

    for &family in CodecFamily::all() {
        let choice = negotiator.negotiate(family).await;
        let kind = if choice.hardware { "hardware" } else { "software" };
        println!("{:<8} {:<22} ({kind})", family.to_string(), choice.encoder);
    }

    Ok(())
}
