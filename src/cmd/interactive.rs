use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use epsfrag::annotation::format_record;
use epsfrag::{AnnotationStore, Command, Context, Mode, OutputFormats, Session, Stage};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

const HELP: &str = "\
Commands:
  list                      show the substitution records
  add <tag> <latex>         append a record (both may be left empty)
  tag <id> <tag>            set the tag of a record
  rep <id> <latex>          set the LaTeX replacement of a record
  opt <id> <key> <value>    set anchor | ps-anchor | scale | rotation (empty resets)
  check <id>                look for the tag in the figure
  candidates                list labels detected in the figure
  format <fmt> [on|off]     toggle pdf | svg | png output
  density <dpi>             set the png density
  save                      write the substitution file
  replace                   write the substitution file and run the toolchain
  help                      show this help
  quit                      leave";

pub async fn cmd_interactive(
    ctx: Context,
    eps: &Path,
    subs: Option<&Path>,
    formats: OutputFormats,
) -> Result<()> {
    info!("Interactive mode selected.");
    let store = AnnotationStore::open(&ctx, eps, subs, Mode::Interactive)?;
    let mut session = Session::new(ctx, store, formats);

    if let Some(creator) = session.store().image().creator() {
        info!("Figure created by {creator}");
    }
    let seeded = session.prepopulate_candidates()?;
    if seeded > 0 {
        eprintln!("🔍 Pre-populated {seeded} record(s) from labels found in the figure");
    }
    print_records(&session);
    eprintln!("Type `help` for the list of commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("epsfrag> ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            eprintln!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("⚠️  {message}");
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        if let Err(e) = dispatch(&mut session, command).await {
            eprintln!("⚠️  {e}");
        }
    }

    Ok(())
}

async fn dispatch(session: &mut Session, command: Command) -> epsfrag::Result<()> {
    match command {
        Command::List => print_records(session),
        Command::Add { tag, replacement } => {
            let id = session.add(&tag, &replacement)?;
            eprintln!("Added record {id}");
        }
        Command::Tag { id, tag } => session.set_tag(id, &tag)?,
        Command::Replacement { id, replacement } => session.set_replacement(id, &replacement)?,
        Command::Placement { id, key, value } => session.set_option(id, key, &value)?,
        Command::Check { id } => {
            session.check(id)?;
        }
        Command::Candidates => {
            let candidates = session.store().image().candidates();
            if candidates.is_empty() {
                eprintln!("No labels detected in the figure");
            }
            for tag in candidates {
                println!("  {tag}");
            }
        }
        Command::Format { format, enabled } => {
            session.set_format(format, enabled)?;
            eprintln!("Formats: {}", session.formats());
        }
        Command::Density(dpi) => {
            session.set_density(dpi)?;
            eprintln!("Formats: {}", session.formats());
        }
        Command::Save => {
            let path = session.save()?;
            eprintln!("💾 Saved {}", path.display());
        }
        Command::Replace => replace(session).await?,
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn replace(session: &mut Session) -> epsfrag::Result<()> {
    session.start_replace()?;

    let mut frame = 0;
    let result = session
        .finish_replace(|stage: Stage| {
            eprint!("\r{} {:<40}", SPINNER[frame % SPINNER.len()], stage.to_string());
            let _ = std::io::stderr().flush();
            frame += 1;
        })
        .await;
    eprint!("\r{:<42}\r", "");

    let report = result?;
    eprintln!("✅ Replacement done in {} step(s)", report.steps.len());
    for path in &report.outputs {
        println!("{}", path.display());
    }
    Ok(())
}

fn print_records(session: &Session) {
    let document = session.store().document();
    if document.is_empty() {
        println!("(no substitutions)");
        return;
    }
    for (id, record) in document.entries() {
        let marker = if record.is_complete() { ' ' } else { '*' };
        println!("{:>4}{marker} {}", id.to_string(), format_record(record));
    }
}
