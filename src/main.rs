use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use taskflow::config::Config;
use taskflow::local::SqliteKvStore;
use taskflow::logging;
use taskflow::remote::RemoteGateway;
use taskflow::result::ApiResult;
use taskflow::store::Stores;
use taskflow::types::{
  Credentials, Language, PasswordChange, Preferences, PreferencesPatch, Priority, ProfileUpdate,
  Registration, TaskDraft, TaskPatch, TaskQuery, TaskSort, TaskStatus, Theme,
};

#[derive(Parser, Debug)]
#[command(name = "taskflow")]
#[command(about = "Manage TaskFlow tasks, online or offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/taskflow/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Print results as compact JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create an account and sign in
  Register {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
  },
  Login {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
  },
  Logout,
  /// Show the signed-in user
  Whoami,
  /// Re-validate the session if its token is about to expire
  RefreshSession,
  ChangePassword {
    #[arg(long)]
    current: String,
    #[arg(long)]
    new: String,
  },
  #[command(subcommand)]
  Tasks(TaskCommand),
  #[command(subcommand)]
  Profile(ProfileCommand),
  /// Categories, templates and statistics served by the service
  #[command(subcommand)]
  Catalog(CatalogCommand),
  #[command(subcommand)]
  Cache(CacheCommand),
  /// Check whether the service is reachable
  Ping,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
  List {
    /// Match title or description
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_parser = parse_status)]
    status: Option<TaskStatus>,
    #[arg(long, value_parser = parse_priority)]
    priority: Option<Priority>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, value_enum, default_value_t = SortArg::DueDate)]
    sort: SortArg,
  },
  Add {
    title: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_priority)]
    priority: Option<Priority>,
    #[arg(long)]
    category: Option<String>,
    /// YYYY-MM-DD or RFC 3339
    #[arg(long)]
    due: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
  },
  Update {
    id: u64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_priority)]
    priority: Option<Priority>,
    #[arg(long, value_parser = parse_status)]
    status: Option<TaskStatus>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    due: Option<String>,
  },
  /// Toggle between completed and pending
  Done { id: u64 },
  Delete { id: u64 },
  Summary,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
  Show,
  Update {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    #[arg(long, value_parser = parse_theme)]
    theme: Option<Theme>,
    #[arg(long, value_parser = parse_language)]
    language: Option<Language>,
    #[arg(long)]
    notifications: Option<bool>,
  },
  /// Replace all preferences at once
  Preferences {
    #[arg(long, value_parser = parse_theme)]
    theme: Theme,
    #[arg(long, value_parser = parse_language)]
    language: Language,
    #[arg(long)]
    notifications: bool,
  },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
  Categories,
  Templates {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    priority: Option<String>,
  },
  Stats {
    #[arg(long)]
    category: Option<String>,
  },
  Achievements,
  Search { term: String },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  Stats,
  /// Gateway settings and cache state
  Info,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
  DueDate,
  Priority,
  Category,
  Created,
  Title,
}

impl From<SortArg> for TaskSort {
  fn from(arg: SortArg) -> Self {
    match arg {
      SortArg::DueDate => TaskSort::DueDate,
      SortArg::Priority => TaskSort::Priority,
      SortArg::Category => TaskSort::Category,
      SortArg::Created => TaskSort::CreatedAt,
      SortArg::Title => TaskSort::Title,
    }
  }
}

/// Parse a lowercase wire name through the type's serde representation.
fn parse_wire<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, String> {
  serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
    .map_err(|_| format!("unknown value '{}'", s))
}

fn parse_priority(s: &str) -> Result<Priority, String> {
  parse_wire(s)
}

fn parse_status(s: &str) -> Result<TaskStatus, String> {
  parse_wire(s)
}

fn parse_theme(s: &str) -> Result<Theme, String> {
  parse_wire(s)
}

fn parse_language(s: &str) -> Result<Language, String> {
  parse_wire(s)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let log_guard = logging::init(&config.logging)?;

  let gateway = if config.api.enabled {
    Some(Arc::new(RemoteGateway::from_config(&config)?))
  } else {
    info!("remote API disabled, using local storage only");
    None
  };
  let janitor = match (&gateway, config.cache.cleanup_interval()) {
    (Some(gateway), Some(period)) => Some(gateway.spawn_janitor(period)),
    _ => None,
  };

  let kv = SqliteKvStore::open_at(config.storage.path.as_deref())?;
  let mut stores =
    Stores::new(gateway, Arc::new(kv)).map_err(|e| eyre!("Failed to restore session: {}", e))?;

  let ok = run(args.command, &mut stores, args.json).await?;

  if let Some(handle) = janitor {
    handle.abort();
  }
  drop(log_guard);

  Ok(if ok {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

async fn run(command: Command, stores: &mut Stores, json: bool) -> Result<bool> {
  match command {
    Command::Register {
      name,
      email,
      password,
    } => {
      let registration = Registration {
        name,
        email,
        password,
      };
      emit(&stores.auth.register(&registration).await, json)
    }
    Command::Login { email, password } => {
      let credentials = Credentials { email, password };
      emit(&stores.auth.login(&credentials).await, json)
    }
    Command::Logout => emit(&stores.auth.logout().await, json),
    Command::Whoami => emit(&stores.auth.current_user().await, json),
    Command::RefreshSession => {
      let expiring = stores.auth.is_token_expiring_soon();
      let active = stores.auth.refresh_if_needed().await;
      let result = if active {
        ApiResult::success(json!({ "refreshed": expiring, "active": true }))
      } else {
        ApiResult::failure("session expired, signed out")
      };
      emit(&result, json)
    }
    Command::ChangePassword { current, new } => {
      let change = PasswordChange {
        current_password: current,
        new_password: new,
      };
      emit(&stores.auth.change_password(&change).await, json)
    }
    Command::Tasks(command) => run_tasks(command, stores, json).await,
    Command::Profile(command) => run_profile(command, stores, json).await,
    Command::Catalog(command) => run_catalog(command, stores, json).await,
    Command::Cache(command) => {
      let gateway = match &stores.gateway {
        Some(gateway) => gateway,
        None => return emit(&disabled(), json),
      };
      match command {
        CacheCommand::Stats => emit(&ApiResult::success(gateway.cache_stats()), json),
        CacheCommand::Info => emit(&ApiResult::success(gateway.service_info()), json),
      }
    }
    Command::Ping => {
      let gateway = match &stores.gateway {
        Some(gateway) => gateway,
        None => return emit(&disabled(), json),
      };
      let result = if gateway.check_connectivity().await {
        ApiResult::success(gateway.service_info())
      } else {
        ApiResult::failure("service unreachable")
      };
      emit(&result, json)
    }
  }
}

async fn run_tasks(command: TaskCommand, stores: &mut Stores, json: bool) -> Result<bool> {
  let tasks = &mut stores.tasks;
  match command {
    TaskCommand::List {
      search,
      status,
      priority,
      category,
      sort,
    } => {
      let query = TaskQuery {
        search,
        status,
        priority,
        category,
        sort: sort.into(),
      };
      let result = tasks.list().await.map(|_| tasks.filter(&query));
      emit(&result, json)
    }
    TaskCommand::Add {
      title,
      description,
      priority,
      category,
      due,
      tags,
    } => {
      let draft = TaskDraft {
        title,
        description,
        priority,
        status: None,
        category,
        due_date: due,
        tags,
      };
      emit(&tasks.create(&draft).await, json)
    }
    TaskCommand::Update {
      id,
      title,
      description,
      priority,
      status,
      category,
      due,
    } => {
      let patch = TaskPatch {
        title,
        description,
        priority,
        status,
        category,
        due_date: due,
        tags: None,
      };
      emit(&tasks.update(id, &patch).await, json)
    }
    TaskCommand::Done { id } => {
      // Populate the working set so the current status is known.
      let listed = tasks.list().await;
      if let Some(error) = listed.error() {
        return emit(&ApiResult::<()>::failure(error), json);
      }
      emit(&tasks.toggle_status(id).await, json)
    }
    TaskCommand::Delete { id } => emit(&tasks.delete(id).await, json),
    TaskCommand::Summary => {
      let result = tasks.list().await.map(|_| tasks.summary());
      emit(&result, json)
    }
  }
}

async fn run_profile(command: ProfileCommand, stores: &mut Stores, json: bool) -> Result<bool> {
  let profile = &mut stores.profile;
  match command {
    ProfileCommand::Show => emit(&profile.load().await, json),
    ProfileCommand::Update {
      name,
      bio,
      theme,
      language,
      notifications,
    } => {
      let preferences = (theme.is_some() || language.is_some() || notifications.is_some()).then(
        || PreferencesPatch {
          theme,
          language,
          notifications,
        },
      );
      let update = ProfileUpdate {
        name,
        bio,
        preferences,
      };
      emit(&profile.update(&update).await, json)
    }
    ProfileCommand::Preferences {
      theme,
      language,
      notifications,
    } => {
      let preferences = Preferences {
        theme,
        language,
        notifications,
      };
      emit(&profile.update_preferences(preferences).await, json)
    }
  }
}

async fn run_catalog(command: CatalogCommand, stores: &Stores, json: bool) -> Result<bool> {
  let gateway = match &stores.gateway {
    Some(gateway) => gateway,
    None => return emit(&disabled(), json),
  };

  match command {
    CatalogCommand::Categories => emit(
      &available(gateway.get_categories().await, "categories"),
      json,
    ),
    CatalogCommand::Templates { category, priority } => {
      let templates = match (category, priority) {
        (Some(category), _) => gateway.templates_by_category(&category).await,
        (None, Some(priority)) => gateway.templates_by_priority(&priority).await,
        (None, None) => gateway
          .get_task_templates()
          .await
          .map(|catalog| catalog.templates)
          .unwrap_or_default(),
      };
      emit(&ApiResult::success(templates), json)
    }
    CatalogCommand::Stats { category: Some(category) } => emit(
      &available(gateway.category_statistics(&category).await, "category statistics"),
      json,
    ),
    CatalogCommand::Stats { category: None } => emit(
      &available(gateway.get_statistics().await, "statistics"),
      json,
    ),
    CatalogCommand::Achievements => emit(&ApiResult::success(gateway.achievements().await), json),
    CatalogCommand::Search { term } => {
      emit(&ApiResult::success(gateway.search_templates(&term).await), json)
    }
  }
}

fn available<T>(value: Option<T>, what: &str) -> ApiResult<T> {
  match value {
    Some(value) => ApiResult::success(value),
    None => ApiResult::failure(format!("{} unavailable", what)),
  }
}

fn disabled() -> ApiResult<()> {
  ApiResult::failure("remote API is disabled in configuration")
}

/// Print a result and report whether it succeeded.
fn emit<T: Serialize>(result: &ApiResult<T>, json: bool) -> Result<bool> {
  let text = if json {
    serde_json::to_string(result)
  } else {
    serde_json::to_string_pretty(result)
  }
  .map_err(|e| eyre!("Failed to serialize result: {}", e))?;

  println!("{}", text);
  Ok(result.is_success())
}
