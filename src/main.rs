use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use margatsni::api::GalleryQuery;
use margatsni::login::{self, LoginForm, RecordingNavigator};
use margatsni::page::{Page, PageState, View};
use margatsni::qr::ObjectUrlRegistry;
use margatsni::render::Links;
use margatsni::storage::FileStore;
use margatsni::{ClientConfig, Id, Session};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "margatsni", version, about = "Fetch and render Margatsni gallery pages")]
struct Cli {
    /// API origin (overrides MARGATSNI_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in milliseconds (overrides MARGATSNI_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// File holding the stored tokens
    #[arg(long, global = true, default_value = ".margatsni/tokens.json")]
    token_file: PathBuf,

    /// Prefix for links between rendered pages
    #[arg(long, global = true, default_value = "/")]
    link_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the returned tokens
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Render the gallery, optionally filtered by tag or owner
    Images {
        #[arg(long, conflicts_with = "user")]
        tag: Option<Id>,
        #[arg(long)]
        user: Option<Id>,
        /// Owner's name, used to title the owner-filtered page
        #[arg(long, requires = "user")]
        username: Option<String>,
    },
    /// Render the list of users
    Users,
    /// Render one user's profile
    User { username: String },
    /// Render the signed-in user's profile
    Me,
    /// Decode and show an image's QR payload
    Qr {
        id: Id,
        /// Write the decoded image bytes here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Exchange the stored refresh token for a new pair
    Refresh,
    /// Sign out and forget stored tokens
    Logout,
}

fn read_password() -> anyhow::Result<String> {
    eprint!("password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("invalid environment configuration")?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(ms) = cli.timeout_ms {
        config.timeout_ms = ms;
    }

    let session = Session::new(Arc::new(FileStore::new(&cli.token_file)));
    let api = margatsni::new_api(config, session.clone()).context("failed to set up API client")?;

    let owner = match &cli.command {
        Command::Images { username, .. } => username.clone(),
        _ => None,
    };

    let view = match cli.command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            let nav = RecordingNavigator::new();
            if let Err(e) = LoginForm::new(&username, &password).submit(&api, &session, &nav) {
                eprintln!("{}", login::login_error_notice(&e).to_html());
                return Err(e).context("login failed");
            }
            if let Some(target) = nav.last() {
                println!("{}", target);
            }
            return Ok(());
        }
        Command::Refresh => return login::refresh(&api, &session).context("refresh failed"),
        Command::Logout => return login::logout(&api, &session).context("logout failed"),
        Command::Images { tag: Some(tag), .. } => View::Gallery(GalleryQuery::Tag(tag)),
        Command::Images { user: Some(user), .. } => View::Gallery(GalleryQuery::User(user)),
        Command::Images { .. } => View::Gallery(GalleryQuery::All),
        Command::Users => View::Users,
        Command::User { username } => View::UserInfo(username),
        Command::Me => View::Me,
        Command::Qr { ref id, ref out } => {
            let images = ObjectUrlRegistry::new();
            let view = View::Qr(id.clone());
            let mut page = view.page();
            view.load(&mut page, &api, &Links::new(&cli.link_prefix), &images);
            if let (Some(path), Some(url)) = (out, page.resources().first()) {
                let image = url.image().context("decoded image was released early")?;
                std::fs::write(path, &image.bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                log::info!("wrote {} bytes ({}) to {}", image.len(), image.mime, path.display());
            }
            println!("{}", page.to_html());
            if let PageState::Failed(msg) = page.state() {
                bail!("{}", msg);
            }
            return Ok(());
        }
    };

    let mut page = page_for(&view, owner.as_deref());
    view.load(&mut page, &api, &Links::new(&cli.link_prefix), &ObjectUrlRegistry::new());
    println!("{}", page.to_html());
    if let PageState::Failed(msg) = page.state() {
        bail!("{}", msg);
    }
    Ok(())
}

fn page_for(view: &View, owner: Option<&str>) -> Page {
    match (view, owner) {
        (View::Gallery(GalleryQuery::User(_)), Some(name)) => {
            Page::new(&format!("{}'s images", name), view.container_id())
        }
        _ => view.page(),
    }
}
