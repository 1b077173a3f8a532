use chrono::Utc;
use clap::{Parser, Subcommand};
use profile_frame::admin::{AssetRestrictions, EVENTS_FILENAME, EventStore, JsonEventStore, NewEvent};
use profile_frame::auth::{
    ATTEMPTS_FILENAME, AuthError, IdentityService, LockoutPolicy, LoginGuard, Role, StaticIdentity,
    password_digest,
};
use profile_frame::cache::FrameCache;
use profile_frame::config::{self, AppConfig};
use profile_frame::imaging::{CropInteraction, RustBackend, Zoom};
use profile_frame::registry::{FrameRegistry, REGISTRY_FILENAME};
use profile_frame::session::{Session, SessionSettings};
use profile_frame::source::{ImageSource, Loader};
use profile_frame::{logging, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const ADMIN_EMAIL_VAR: &str = "PROFILE_FRAME_ADMIN_EMAIL";
const ADMIN_PASSWORD_VAR: &str = "PROFILE_FRAME_ADMIN_PASSWORD";

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "profile-frame")]
#[command(about = "Crop a photo, add a frame, export a 1080x1080 profile picture")]
#[command(long_about = "\
Crop a photo, add a frame, export a 1080x1080 profile picture

The photo is shown fitted to the display width (display.max_width) and
scaled by zoom. Crop coordinates are given in that displayed space, exactly
as a user would drag them on screen. The initial crop is a centered square
covering 90% of the shorter edge.

  profile-frame compose me.jpg                        # centered crop, selected frame
  profile-frame compose me.jpg --zoom 1.5 --move -40,0
  profile-frame compose me.jpg --crop 0,0,300 --frame gold

Frames and events are managed with the `frames` and `events` subcommands.
When admin.require_auth is set, changes require credentials in
PROFILE_FRAME_ADMIN_EMAIL and PROFILE_FRAME_ADMIN_PASSWORD.

Run 'profile-frame gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// State directory (overrides state_dir from config)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop a photo, composite the frame and export the PNG
    Compose(ComposeArgs),
    /// Manage the frame registry
    Frames {
        #[command(subcommand)]
        action: FramesCommand,
    },
    /// Manage event records
    Events {
        #[command(subcommand)]
        action: EventsCommand,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
    /// Print the SHA-256 digest of a password for admin.password_sha256
    HashPassword { password: String },
}

#[derive(clap::Args)]
struct ComposeArgs {
    /// Photo: local path, https:// URL or data:image/...;base64 payload
    photo: String,

    /// Frame name to use instead of the registry's selection
    #[arg(long)]
    frame: Option<String>,

    /// Crop square as X,Y,SIDE in displayed pixels
    #[arg(long, allow_hyphen_values = true, value_parser = parse_crop)]
    crop: Option<(f64, f64, f64)>,

    /// Move the crop by DX,DY displayed pixels
    #[arg(long = "move", allow_hyphen_values = true, value_parser = parse_offset)]
    shift: Option<(f64, f64)>,

    /// Display zoom, clamped to 0.5-3.0
    #[arg(long)]
    zoom: Option<f64>,

    /// Directory to write the PNG to (overrides output.directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip the remote frame cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum FramesCommand {
    /// List frames, marking the selection
    List,
    /// Add or replace a frame. Local image files are checked and embedded.
    Add {
        name: String,
        /// https:// URL, data: payload or local image file
        source: String,
        /// Store a local path as a reference instead of embedding the file
        #[arg(long)]
        link: bool,
    },
    /// Remove a frame
    Remove { name: String },
    /// Select the frame used by compose
    Select { name: String },
}

#[derive(Subcommand)]
enum EventsCommand {
    /// List events, newest first
    List,
    /// Create an event
    Create { name: String, slug: String },
    /// Delete an event by id
    Delete { id: Uuid },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }
    if let Command::HashPassword { password } = &cli.command {
        println!("{}", password_digest(password));
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    logging::init_tracing(&config.logging.level)?;
    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(|| config.state_dir.clone());

    match cli.command {
        Command::Compose(args) => compose(&config, &state_dir, args).await?,
        Command::Frames { action } => frames(&config, &state_dir, action)?,
        Command::Events { action } => events(&config, &state_dir, action)?,
        Command::GenConfig | Command::HashPassword { .. } => {}
    }

    Ok(())
}

async fn compose(
    config: &AppConfig,
    state_dir: &Path,
    args: ComposeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut loader = Loader::new(Duration::from_secs(config.fetch.timeout_secs))?;
    if config.fetch.cache && !args.no_cache {
        loader = loader.with_cache(FrameCache::open(state_dir.join("frame-cache")));
    }

    let mut settings = SessionSettings::from(config);
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }

    let registry = load_registry(config, state_dir)?;
    let mut session = Session::new(Arc::new(RustBackend::new()), loader, registry, settings);
    if let Some(name) = &args.frame {
        session.registry_mut().select(name)?;
    }

    session.load_photo(ImageSource::parse(&args.photo)?).await?;
    if let Some(z) = args.zoom {
        session.set_zoom(Zoom::new(z));
    }
    if let Some((x, y, side)) = args.crop {
        session.update_crop(CropInteraction::Replace {
            x,
            y,
            width: side,
            height: side,
        });
    }
    if let Some((dx, dy)) = args.shift {
        session.update_crop(CropInteraction::Move { dx, dy });
    }
    session.commit_crop();

    let crop_lines = match (
        session.photo_source(),
        session.natural_size(),
        session.displayed_size(),
        session.committed_crop(),
    ) {
        (Some(source), Some(natural), Some(displayed), Some(crop)) => {
            output::format_crop(source, natural, displayed, session.zoom(), &crop)
        }
        _ => Vec::new(),
    };

    let job = session.begin_export()?;
    let outcome = job.run().await?;
    output::print_compose(&crop_lines, &outcome);
    Ok(())
}

fn frames(
    config: &AppConfig,
    state_dir: &Path,
    action: FramesCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = state_dir.join(REGISTRY_FILENAME);
    let mut registry = load_registry(config, state_dir)?;

    match action {
        FramesCommand::List => {
            output::print_frames(&registry);
            return Ok(());
        }
        FramesCommand::Add { name, source, link } => {
            require_role(config, state_dir, Role::Admin)?;
            let source = match ImageSource::parse(&source)? {
                ImageSource::Path(file) if !link => {
                    AssetRestrictions::default().check_file(&file, &RustBackend::new())?;
                    ImageSource::data_url_from_file(&file)?
                }
                other => other,
            };
            registry.add(&name, source)?;
        }
        FramesCommand::Remove { name } => {
            require_role(config, state_dir, Role::Admin)?;
            registry.remove(&name)?;
        }
        FramesCommand::Select { name } => {
            require_role(config, state_dir, Role::Admin)?;
            registry.select(&name)?;
        }
    }

    registry.save(&path)?;
    output::print_frames(&registry);
    Ok(())
}

fn events(
    config: &AppConfig,
    state_dir: &Path,
    action: EventsCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = JsonEventStore::open(state_dir.join(EVENTS_FILENAME))?;

    match action {
        EventsCommand::List => {
            require_role(config, state_dir, Role::Viewer)?;
        }
        EventsCommand::Create { name, slug } => {
            require_role(config, state_dir, Role::Admin)?;
            store.create(NewEvent { name, slug })?;
        }
        EventsCommand::Delete { id } => {
            require_role(config, state_dir, Role::Admin)?;
            store.delete(id)?;
        }
    }

    output::print_events(&store.list()?);
    Ok(())
}

/// Registry from `frames.json`, or from the config seed on first run.
fn load_registry(config: &AppConfig, state_dir: &Path) -> Result<FrameRegistry, Box<dyn std::error::Error>> {
    let registry =
        FrameRegistry::load_or_seed(&state_dir.join(REGISTRY_FILENAME), config.seed_frames())?;
    Ok(registry)
}

/// Sign in with the environment credentials when auth is required.
fn require_role(config: &AppConfig, state_dir: &Path, role: Role) -> Result<(), Box<dyn std::error::Error>> {
    if !config.admin.require_auth {
        return Ok(());
    }
    let (Ok(email), Ok(password)) = (
        std::env::var(ADMIN_EMAIL_VAR),
        std::env::var(ADMIN_PASSWORD_VAR),
    ) else {
        return Err(AuthError::NotSignedIn.into());
    };

    let identity = StaticIdentity::new(
        &config.admin.email,
        &config.admin.password_sha256,
        config.admin.role,
    );
    let mut guard = LoginGuard::open(state_dir.join(ATTEMPTS_FILENAME), LockoutPolicy::default());
    let session = guard.sign_in(&identity, &email, &password, Utc::now())?;
    session.require(role)?;
    info!(email = %session.email, "authorized");
    identity.sign_out();
    Ok(())
}

fn parse_numbers<const N: usize>(raw: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {N} comma-separated numbers, got '{raw}'"));
    }
    let mut values = [0.0; N];
    for (slot, part) in values.iter_mut().zip(parts) {
        *slot = part
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("'{part}' is not a number"))?;
    }
    Ok(values)
}

fn parse_crop(raw: &str) -> Result<(f64, f64, f64), String> {
    let [x, y, side] = parse_numbers::<3>(raw)?;
    Ok((x, y, side))
}

fn parse_offset(raw: &str) -> Result<(f64, f64), String> {
    let [dx, dy] = parse_numbers::<2>(raw)?;
    Ok((dx, dy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_crop_triple() {
        assert_eq!(parse_crop("10, 20,300"), Ok((10.0, 20.0, 300.0)));
        assert!(parse_crop("1,2").is_err());
        assert!(parse_crop("a,b,c").is_err());
    }

    #[test]
    fn parse_negative_offset() {
        assert_eq!(parse_offset("-40,5.5"), Ok((-40.0, 5.5)));
        assert!(parse_offset("nan,0").is_err());
    }

    #[test]
    fn compose_accepts_negative_move() {
        let cli = Cli::try_parse_from(["profile-frame", "compose", "me.jpg", "--move", "-40,0"]).unwrap();
        let Command::Compose(args) = cli.command else {
            panic!("expected compose");
        };
        assert_eq!(args.shift, Some((-40.0, 0.0)));
    }
}
