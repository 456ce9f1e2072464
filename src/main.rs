// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::env;
use std::fs::{File, OpenOptions};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Use library instead of local modules
use matchmaker::admin::{self, MemberFilter, NewMember};
use matchmaker::{
    create_session, open_database, seed_reference_data, Config, ContactUnlocker, LocalApi, PlanRegistry, ProfileApi,
    SqliteStorage,
};

const USAGE: &str = "Usage:
  matchmaker init
  matchmaker member-add <email> <first> <last> <gender>
  matchmaker token <member_id>
  matchmaker export <csv_path>
  matchmaker contact <member_id> <profile_id>
  matchmaker plans
  matchmaker support <member_id> [<subject> <message>]
  matchmaker [wizard] <member_id>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("wizard");

    // The wizard owns the terminal, so its logs go to a file
    init_logging(matches!(command, "wizard") || command.parse::<i64>().is_ok())?;

    let config = Config::load()?;

    match command {
        "init" => run_init(&config),
        "member-add" => run_member_add(&config, &args[2..]),
        "token" => run_token(&config, arg(&args, 2, "member_id")?),
        "export" => run_export(&config, arg(&args, 2, "csv_path")?),
        "contact" => run_contact(&config, arg(&args, 2, "member_id")?, arg(&args, 3, "profile_id")?),
        "plans" => run_plans(&config),
        "support" => run_support(&config, arg(&args, 2, "member_id")?, &args[3..]),
        "wizard" => run_ui_mode(&config, args.get(2).map(String::as_str)),
        other if other.parse::<i64>().is_ok() => run_ui_mode(&config, Some(other)),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n{}", other, USAGE),
    }
}

fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "matchmaker=info".into());

    if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open("matchmaker.log")
            .context("Failed to open matchmaker.log")?;
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(value) => Ok(value),
        None => bail!("Missing <{}>\n{}", name, USAGE),
    }
}

fn parse_id(raw: &str, name: &str) -> Result<i64> {
    raw.parse().with_context(|| format!("<{}> must be a number, got '{}'", name, raw))
}

fn run_init(config: &Config) -> Result<()> {
    println!("🗄️  Matchmaker - Database setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.db_path)?;
    println!("✓ Schema ready at {}", config.db_path.display());

    let inserted = seed_reference_data(&conn)?;
    println!("✓ Reference data seeded ({} new rows)", inserted);

    Ok(())
}

fn run_member_add(config: &Config, args: &[String]) -> Result<()> {
    let [email, first, last, gender] = args else {
        bail!("member-add takes exactly 4 arguments\n{}", USAGE);
    };

    let conn = open_database(&config.db_path)?;
    let new = NewMember {
        email: email.clone(),
        first_name: first.clone(),
        last_name: last.clone(),
        gender: Some(gender.clone()),
        status: Some("active".to_string()),
        ..Default::default()
    };
    let member = admin::create_member(&conn, &new, &PlanRegistry::new(), "cli")?;

    println!("✓ Member {} created ({}, {})", member.id, member.full_name(), member.email);
    Ok(())
}

fn run_token(config: &Config, member_id: &str) -> Result<()> {
    let conn = open_database(&config.db_path)?;
    let token = create_session(&conn, parse_id(member_id, "member_id")?)?;

    // Printed once; only its hash is stored
    println!("{}", token);
    Ok(())
}

fn run_export(config: &Config, csv_path: &str) -> Result<()> {
    let conn = open_database(&config.db_path)?;
    let file = File::create(csv_path).with_context(|| format!("Failed to create {}", csv_path))?;

    let rows = admin::export_members_csv(&conn, &MemberFilter::default(), Utc::now().date_naive(), file)?;

    println!("✓ Exported {} members to {}", rows, csv_path);
    Ok(())
}

#[cfg(feature = "client")]
fn remote(config: &Config) -> Result<Option<Box<dyn ProfileApi>>> {
    Ok(matchmaker::HttpApi::from_config(config)?.map(|api| Box::new(api) as Box<dyn ProfileApi>))
}

#[cfg(not(feature = "client"))]
fn remote(config: &Config) -> Result<Option<Box<dyn ProfileApi>>> {
    if config.api_url.is_some() {
        tracing::warn!("MATCHMAKER_API_URL ignored: built without the client feature");
    }
    Ok(None)
}

/// Backend for client commands: remote when `MATCHMAKER_API_URL` is set,
/// otherwise the local database acting as `member_id`
fn connect(config: &Config, member_id: Option<i64>) -> Result<Box<dyn ProfileApi>> {
    if let Some(api) = remote(config)? {
        return Ok(api);
    }

    let Some(member_id) = member_id else {
        bail!("A <member_id> is required without MATCHMAKER_API_URL\n{}", USAGE);
    };
    let conn = open_database(&config.db_path)?;
    Ok(Box::new(LocalApi::new(Arc::new(Mutex::new(conn)), member_id, config.upload_dir.clone())))
}

fn run_contact(config: &Config, member_id: &str, profile_id: &str) -> Result<()> {
    let api = connect(config, Some(parse_id(member_id, "member_id")?))?;
    let profile_id = parse_id(profile_id, "profile_id")?;
    let storage = SqliteStorage::open(&config.device_db_path)?;

    let credits = api.dashboard()?.remaining.contact_views;
    let mut unlocker = ContactUnlocker::new(api.as_ref(), &storage, credits);

    match unlocker.unlock(profile_id) {
        Ok(details) => {
            println!("📇 Contact of member {}", details.member_id);
            println!("   Email: {}", details.email);
            println!("   Phone: {}", details.phone.as_deref().unwrap_or("-"));
            println!("   Contact views left: {}", details.remaining);
            Ok(())
        }
        Err(e) => bail!("{}", e.alert_message()),
    }
}

fn run_plans(config: &Config) -> Result<()> {
    let plans = match remote(config)? {
        Some(api) => api.plans()?,
        None => PlanRegistry::new().all(),
    };

    println!("📦 Packages");
    for plan in plans {
        println!(
            "   {:<10} {:>8.2}  {:>3} days  contacts {:>3}  interests {:>3}  photos {:>3}",
            plan.name,
            plan.price as f64 / 100.0,
            plan.validity_days,
            plan.limitation.contact_views,
            plan.limitation.express_interests,
            plan.limitation.gallery_uploads,
        );
    }
    Ok(())
}

fn run_support(config: &Config, member_id: &str, rest: &[String]) -> Result<()> {
    let api = connect(config, Some(parse_id(member_id, "member_id")?))?;

    match rest {
        [] => {}
        [subject, message] => {
            let ticket = api.open_support_ticket(subject, message).map_err(|e| anyhow::anyhow!(e.alert_message()))?;
            println!("✓ Ticket {} opened", ticket.id);
        }
        _ => bail!("support takes a subject and a message, or nothing\n{}", USAGE),
    }

    for ticket in api.support_tickets()? {
        println!("🎫 #{} [{}] {} ({})", ticket.id, ticket.status.as_str(), ticket.subject, ticket.created_at);
        if let Some(reply) = &ticket.reply {
            println!("   ↳ {}", reply);
        }
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config, member_id: Option<&str>) -> Result<()> {
    let member_id = member_id.map(|raw| parse_id(raw, "member_id")).transpose()?;
    let api = connect(config, member_id)?;
    let api: &dyn ProfileApi = api.as_ref();

    let wizard = matchmaker::ProfileWizard::open(api, None);
    let mut app = ui::App::new(wizard);
    ui::run_ui(&mut app)?;

    if app.wizard.is_finished() {
        println!("\n✅ Profile complete");
    } else {
        println!(
            "\n✓ Stopped at step {} of {}",
            app.wizard.sequencer().current(),
            app.wizard.sequencer().last()
        );
    }

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config, _member_id: Option<&str>) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the server: cargo run --bin matchmaker-server --features server");
    std::process::exit(1);
}
