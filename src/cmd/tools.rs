use anyhow::{bail, Result};

use epsfrag::pipeline::check_toolchain;
use epsfrag::{Config, OutputFormats};

pub fn cmd_check_tools(config: &Config, formats: &OutputFormats) -> Result<()> {
    println!("🔧 External programs (formats: {formats}):\n");

    let mut missing = Vec::new();
    for status in check_toolchain(&config.tools, formats) {
        match (&status.resolved, status.required) {
            (Some(path), _) => println!("   ✅ {:<8} {}", status.name, path.display()),
            (None, true) => {
                println!("   ❌ {:<8} {} not found", status.name, status.program);
                missing.push(status.name);
            }
            (None, false) => {
                println!("   ⚠️  {:<8} {} not found (optional)", status.name, status.program);
            }
        }
    }

    if !missing.is_empty() {
        bail!("missing required programs: {}", missing.join(", "));
    }
    Ok(())
}
