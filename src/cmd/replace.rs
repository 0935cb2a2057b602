use std::path::Path;

use anyhow::Result;
use tracing::info;

use epsfrag::{AnnotationStore, Context, Error, Invoker, Mode, OutputFormats};

pub async fn cmd_replace(
    ctx: Context,
    eps: &Path,
    subs: Option<&Path>,
    formats: OutputFormats,
) -> Result<()> {
    info!("Non-interactive mode selected.");
    let store = AnnotationStore::open(&ctx, eps, subs, Mode::Headless)?;

    let count = store.document().complete_records().count();
    if count == 0 {
        return Err(Error::NoSubstitutions.into());
    }

    eprintln!("🏷  Replacing {count} label(s) in {}", eps.display());
    eprintln!("   Formats: {formats}");

    let start = std::time::Instant::now();
    let report = Invoker::new(ctx)
        .with_formats(formats)
        .run(&store.snapshot(), store.image())
        .await?;
    let elapsed = start.elapsed();

    eprintln!("\n✅ Done in {:.1}s", elapsed.as_secs_f64());
    eprintln!("   Substitutions: {}", report.subs_file.display());
    for path in &report.outputs {
        println!("{}", path.display());
    }

    Ok(())
}
