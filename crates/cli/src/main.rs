use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use zara::api::{ChatId, HttpBackend, Message, Role};
use zara::auth::{AuthController, AuthError, Registration};
use zara::chats::{display_title, ChatListController};
use zara::conversation::{ChatError, ConversationController, SendError, SendOutcome};
use zara::session::SessionStore;
use zara::upload::PendingUpload;

const SIGN_IN_HINT: &str = "not signed in (or the session expired); run `zara login` first";

#[derive(Parser)]
#[command(name = "zara")]
#[command(about = "Zara CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: ZARA_CONFIG_PATH or ~/.zara/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the local mock backend (in-memory accounts and chats, rule-based replies).
    Serve {
        /// Config file path (default: ZARA_CONFIG_PATH or ~/.zara/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Create an account and sign in.
    Register {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long)]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "ZARA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Confirmation (defaults to the password)
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Sign in and store the session token.
    Login {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long)]
        email: String,

        #[arg(long, env = "ZARA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session.
    Logout {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Check the stored session with the backend and show the signed-in user.
    Whoami {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// List chats, newest first.
    Chats {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Only show chats whose title contains this text (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,
    },

    /// Show the display theme, or toggle it.
    Theme {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long)]
        toggle: bool,
    },

    /// Chat with Zara (interactive).
    Chat {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Existing chat id to continue; a new chat is started otherwise.
        #[arg(long, value_name = "ID")]
        chat: Option<ChatId>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("zara {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config),
        Some(Commands::Serve { config, port }) => run_serve(config, port).await,
        Some(Commands::Register {
            config,
            first_name,
            last_name,
            email,
            password,
            confirm_password,
        }) => {
            let form = Registration {
                first_name,
                last_name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            run_register(config, form).await
        }
        Some(Commands::Login {
            config,
            email,
            password,
        }) => run_login(config, &email, &password).await,
        Some(Commands::Logout { config }) => run_logout(config),
        Some(Commands::Whoami { config }) => run_whoami(config).await,
        Some(Commands::Chats { config, search }) => run_chats(config, search).await,
        Some(Commands::Theme { config, toggle }) => run_theme(config, toggle),
        Some(Commands::Chat { config, chat }) => run_chat(config, chat).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Loaded config plus the session store and gateway built from it.
struct App {
    config: zara::config::Config,
    state_dir: PathBuf,
    session: Arc<SessionStore>,
    backend: Arc<HttpBackend>,
}

impl App {
    fn open(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let (config, path) = zara::config::load_config(config_path)?;
        let state_dir = zara::config::state_dir(&path);
        let session = Arc::new(SessionStore::open(&state_dir));
        let backend = Arc::new(HttpBackend::from_config(&config, session.clone()));
        log::debug!("using api at {}", backend.base_url());
        Ok(Self {
            config,
            state_dir,
            session,
            backend,
        })
    }

    fn auth(&self) -> AuthController {
        AuthController::new(self.backend.clone(), self.session.clone())
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(zara::config::default_config_path);
    let dir = zara::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, _) = zara::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting mock backend on {}:{}",
        config.server.bind,
        config.server.port
    );
    zara::server::run_server(&config).await
}

async fn run_register(config_path: Option<PathBuf>, form: Registration) -> anyhow::Result<()> {
    let app = App::open(config_path)?;
    match app.auth().register(&form).await {
        Ok(session) => {
            println!("registered and signed in as {}", session.user.username);
            Ok(())
        }
        Err(AuthError::AlreadyRegistered) => {
            anyhow::bail!("account already exists; run `zara login` instead")
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_login(
    config_path: Option<PathBuf>,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let app = App::open(config_path)?;
    let session = app.auth().login(email, password).await?;
    println!(
        "signed in as {} <{}>",
        session.user.username, session.user.email
    );
    Ok(())
}

fn run_logout(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let app = App::open(config_path)?;
    app.auth().logout();
    println!("signed out");
    Ok(())
}

async fn run_whoami(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let app = App::open(config_path)?;
    match app.auth().validate_session().await {
        Ok(user) => {
            println!("{} <{}>", user.username, user.email);
            Ok(())
        }
        Err(AuthError::ReauthRequired) => anyhow::bail!(SIGN_IN_HINT),
        Err(e) => Err(e.into()),
    }
}

async fn run_chats(config_path: Option<PathBuf>, search: Option<String>) -> anyhow::Result<()> {
    let app = App::open(config_path)?;
    if !app.session.is_signed_in() {
        anyhow::bail!(SIGN_IN_HINT);
    }
    let conversation = Rc::new(ConversationController::new(
        app.backend.clone(),
        app.session.clone(),
    ));
    let chats = ChatListController::new(app.backend.clone(), app.session.clone(), conversation);
    match chats.reload().await {
        Ok(()) => {}
        Err(ChatError::ReauthRequired) => anyhow::bail!(SIGN_IN_HINT),
        Err(e) => return Err(e.into()),
    }
    let term = search.unwrap_or_default();
    let mut shown = 0;
    for chat in chats.filter(&term).iter() {
        println!(
            "{:>6}  {}  {}",
            chat.id,
            chat.created_at.format("%Y-%m-%d %H:%M"),
            display_title(chat)
        );
        shown += 1;
    }
    if shown == 0 {
        println!("no chats");
    }
    Ok(())
}

fn run_theme(config_path: Option<PathBuf>, toggle: bool) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(zara::config::default_config_path);
    let dir = zara::config::state_dir(&path);
    let theme = if toggle {
        zara::prefs::toggle_theme(&dir)?
    } else {
        zara::prefs::load_theme(&dir)
    };
    println!("{}", theme.as_str());
    Ok(())
}

const CHAT_HELP: &str = "commands:
  /new                 start a new chat
  /chats [text]        list chats (optionally filtered)
  /open <id>           open a chat
  /rename <id> <title> rename a chat
  /delete <id>         delete a chat
  /attach <path>       attach a file to the next message
  /detach              drop the pending attachment
  /exit                quit";

async fn run_chat(config_path: Option<PathBuf>, chat: Option<ChatId>) -> anyhow::Result<()> {
    let app = App::open(config_path)?;
    let user = match app.auth().validate_session().await {
        Ok(user) => user,
        Err(AuthError::ReauthRequired) => anyhow::bail!(SIGN_IN_HINT),
        Err(e) => return Err(e.into()),
    };
    let theme = zara::prefs::load_theme(&app.state_dir);
    log::debug!("theme {}", theme.as_str());

    let conversation = Rc::new(
        ConversationController::new(app.backend.clone(), app.session.clone())
            .with_request_timeout(app.config.api.request_timeout()),
    );
    let chats = ChatListController::new(
        app.backend.clone(),
        app.session.clone(),
        conversation.clone(),
    );

    let startup = async {
        if let Some(id) = chat {
            conversation.load_chat(id).await?;
        }
        chats.refresh().await
    };
    if let Err(e) = startup.await {
        return match e {
            ChatError::ReauthRequired => anyhow::bail!(SIGN_IN_HINT),
            e => Err(e.into()),
        };
    }

    println!(
        "signed in as {}. type /help for commands.",
        user.username
    );
    let mut shown = 0;
    render(&conversation, &mut shown);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let step = if input.starts_with('/') {
            run_command(input, &conversation, &chats, &mut shown).await
        } else {
            send(input, &conversation, &chats).await
        };
        match step {
            Ok(()) => {}
            Err(ChatError::ReauthRequired) => {
                eprintln!("{}", SIGN_IN_HINT);
                break;
            }
            Err(ChatError::Api(e)) => eprintln!("error: {}", e.message()),
        }
        render(&conversation, &mut shown);
    }

    Ok(())
}

async fn send(
    text: &str,
    conversation: &ConversationController,
    chats: &ChatListController,
) -> Result<(), ChatError> {
    let outcome = match conversation.send_message(text, None).await {
        Ok(outcome) => outcome,
        Err(SendError::ReauthRequired) => return Err(ChatError::ReauthRequired),
        Err(e @ (SendError::Empty | SendError::InFlight)) => {
            eprintln!("{}", e);
            return Ok(());
        }
    };
    if let SendOutcome::Fallback(e) = &outcome {
        log::warn!("reply unavailable: {}", e);
    }
    chats.refresh_after_send(&outcome).await.map(|_| ())
}

fn parse_id(arg: &str) -> Option<ChatId> {
    arg.trim().parse().ok()
}

async fn run_command(
    input: &str,
    conversation: &ConversationController,
    chats: &ChatListController,
    shown: &mut usize,
) -> Result<(), ChatError> {
    let (command, rest) = input.split_once(' ').unwrap_or((input, ""));
    let rest = rest.trim();
    match command {
        "/help" => println!("{}", CHAT_HELP),
        "/new" => {
            let chat = chats.create_new().await?;
            *shown = 0;
            println!("started chat {}", chat.id);
        }
        "/chats" => {
            let active = conversation.active_chat();
            for chat in chats.filter(rest).iter() {
                let marker = if Some(chat.id) == active { '*' } else { ' ' };
                println!("{} {:>6}  {}", marker, chat.id, display_title(chat));
            }
        }
        "/open" => match parse_id(rest) {
            Some(id) => {
                conversation.load_chat(id).await?;
                *shown = 0;
            }
            None => eprintln!("usage: /open <id>"),
        },
        "/rename" => {
            let (id, title) = rest.split_once(' ').unwrap_or((rest, ""));
            match parse_id(id) {
                Some(id) => {
                    if !chats.rename(id, title).await? {
                        eprintln!("title cannot be empty");
                    }
                }
                None => eprintln!("usage: /rename <id> <title>"),
            }
        }
        "/delete" => match parse_id(rest) {
            Some(id) => {
                let was_active = conversation.active_chat() == Some(id);
                chats.remove(id).await?;
                if was_active {
                    *shown = 0;
                }
                println!("deleted chat {}", id);
            }
            None => eprintln!("usage: /delete <id>"),
        },
        "/attach" => match PendingUpload::from_path(std::path::Path::new(rest)) {
            Ok(upload) => {
                let kind = if upload.is_image() { "image" } else { "file" };
                println!("attached {} {} ({})", kind, upload.filename, upload.mime_type);
                conversation.attach(upload);
            }
            Err(e) => eprintln!("{}", e),
        },
        "/detach" => match conversation.detach() {
            Some(upload) => println!("dropped {}", upload.filename),
            None => println!("nothing attached"),
        },
        _ => eprintln!("unknown command {}; type /help", command),
    }
    Ok(())
}

/// Print messages the view has not shown yet, up to the newest one a change asked to scroll to.
fn render(conversation: &ConversationController, shown: &mut usize) {
    let Some(newest) = conversation.take_scroll_request() else {
        return;
    };
    if *shown > newest {
        *shown = 0;
    }
    for message in conversation.messages().iter().take(newest + 1).skip(*shown) {
        print_message(message);
    }
    *shown = newest + 1;
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "zara",
    };
    if let Some(att) = &message.attachment {
        println!("[{}] (attachment: {})", who, att.mime_type);
    }
    println!("[{}] {}", who, message.content.trim());
}
