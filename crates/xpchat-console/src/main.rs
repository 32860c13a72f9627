use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use xpchat_console::terminal::{self, Input, LINE_HEIGHT};
use xpchat_console::{Collaborators, Console, ConsoleConfig, LocalAuth};
use xpchat_db::{Database, SqliteMembership};
use xpchat_feed::TextSurface;
use xpchat_hub::{Hub, MemoryMediaStore};
use xpchat_services::{HttpAssistant, HttpMediaStore};
use xpchat_types::collab::{Assistant, AuthProvider, MediaStore};
use xpchat_types::models::Draft;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so the screen stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xpchat=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Unhandled panics still leave a visible line on screen
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("{info}");
        println!("\n-- FATAL: {info}");
        default_panic(info);
    }));

    let config = ConsoleConfig::from_env()?;

    // Membership store, seeded with the configured invite codes
    let db = Arc::new(Database::open(&config.db_path)?);
    for code in &config.invites {
        db.upsert_invite(code, &config.room.space_id, "member", true)?;
    }
    info!("{} invite code(s) seeded for {}", config.invites.len(), config.room.space_id);

    let media: Arc<dyn MediaStore> = match &config.media_endpoint {
        Some(url) => Arc::new(HttpMediaStore::new(url.clone(), UPLOAD_TIMEOUT)?),
        None => Arc::new(MemoryMediaStore::new()),
    };
    let assistant: Option<Arc<dyn Assistant>> = match &config.ai_endpoint {
        Some(url) => Some(Arc::new(HttpAssistant::new(url.clone(), config.composer.ai_timeout)?)),
        None => {
            warn!("XPCHAT_AI_ENDPOINT not set, @ia is disabled");
            None
        }
    };

    let user = config
        .user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "user".into());
    let auth = Arc::new(LocalAuth::new(user));
    let mut auth_changes = auth.watch();

    let services = Collaborators {
        auth,
        membership: Arc::new(SqliteMembership::new(db)),
        store: Arc::new(Hub::new()),
        media: Some(media),
        assistant,
    };

    let rows = config.screen_rows as f64;
    let mut console = Console::new(&config, services, move || {
        TextSurface::with_row_height(rows * LINE_HEIGHT, LINE_HEIGHT)
    })
    .with_observer(terminal::redraw());

    console.boot();
    let _ = console.sign_in().await;

    let mut printed = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        // Notices raised while no feed is on screen are printed as-is.
        if console.feed().is_none() {
            for notice in &console.transcript()[printed..] {
                println!("-- {notice}");
            }
        }
        printed = console.transcript().len();

        tokio::select! {
            changed = auth_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                console.sync_auth().await;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Input::Draft(body) => {
                        let mut draft = Draft::text(body);
                        let _ = console.submit(&mut draft).await;
                    }
                    Input::Retry => {
                        let _ = console.retry().await;
                    }
                    Input::Join(code) => {
                        let _ = console.join(&code).await;
                    }
                    Input::Room(raw) => match terminal::room_target(console.room(), &raw) {
                        Some(room) => console.switch_room(room).await,
                        None => println!("-- UNKNOWN_ROOM: {raw}"),
                    },
                    Input::React { id, emoji } => {
                        let _ = console.react(&id, &emoji).await;
                    }
                    Input::Delete(id) => {
                        let _ = console.delete(&id).await;
                    }
                    Input::Image(path) => match terminal::load_image(&path).await {
                        Ok(file) => {
                            let mut draft = Draft::image(file);
                            let _ = console.submit(&mut draft).await;
                        }
                        Err(e) => println!("-- IMAGE_FAILED: {e}"),
                    },
                    Input::Scroll(delta) => {
                        if let Some(snapshot) = console.snapshot().await {
                            let top = snapshot.metrics.scroll_top + delta * LINE_HEIGHT;
                            console.scroll_to(top.max(0.0));
                        }
                    }
                    Input::Bottom => console.jump_to_latest(),
                    Input::Login => {
                        let _ = console.sign_in().await;
                    }
                    Input::Logout => console.sign_out().await,
                    Input::Quit => break,
                    Input::Unknown(raw) => println!("-- UNKNOWN_COMMAND: {raw}"),
                }
            }
        }
    }

    console.shutdown().await;
    Ok(())
}
