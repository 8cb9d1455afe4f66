//! `polza` command-line host.
//!
//! # Responsibility
//! - Map subcommands onto the core document store, settings, converters and
//!   the improve orchestrator.
//! - Own process setup: data directory, logging and the database file.

use anyhow::{anyhow, bail, Context, Result};
use polza_core::convert::{self, DOCX_EXPORT_FILE_NAME, TEXT_EXPORT_FILE_NAME};
use polza_core::db::{open_db, Connection};
use polza_core::{
    init_logging, resolve_log_level, DocumentStore, EditingSurface, EditorSession,
    ImproveOrchestrator, ImproveOutcome, KeyValueStore, MemorySurface, PolzaClient, Selection,
    SettingKey, Settings, SqliteKeyValueStore, MODEL_CATALOG,
};
use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "POLZA_DATA_DIR";
const DATABASE_FILE: &str = "polza.db";

const USAGE: &str = "\
usage: polza [--data-dir <dir>] <command>

commands:
  list                          list documents, active one marked with *
  new                           create a document and make it active
  open <id>                     make a document active
  delete <id>                   delete a document
  rename <title>                rename the active document
  show                          print the active document as plain text
  import <file>                 import a .txt or .docx file
  export-docx [path]            export the active document as DOCX
  export-txt [path]             export the active document as plain text
  improve [--from N --to N]     improve a range, the text after the marker, or everything
  config show                   print settings
  config set <key> <value>      set api-key, model or dark-mode
  models                        list known models";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    List,
    New,
    Open(String),
    Delete(String),
    Rename(String),
    Show,
    Import(PathBuf),
    ExportDocx(Option<PathBuf>),
    ExportText(Option<PathBuf>),
    Improve(Option<Selection>),
    ConfigShow,
    ConfigSet(SettingKey, String),
    Models,
    Help,
}

#[derive(Debug)]
struct Invocation {
    data_dir: Option<PathBuf>,
    command: Command,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let invocation = parse_args(std::env::args().skip(1))?;
    if invocation.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }
    if invocation.command == Command::Models {
        for model in MODEL_CATALOG {
            println!("{}\t{}", model.id, model.name);
        }
        return Ok(());
    }

    let data_dir = resolve_data_dir(invocation.data_dir)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory `{}`", data_dir.display()))?;
    if let Err(err) = init_logging(&resolve_log_level(), &data_dir.join("logs")) {
        eprintln!("warning: file logging disabled: {err}");
    }
    log::info!("event=cli_start module=cli status=ok");

    let conn = open_db(data_dir.join(DATABASE_FILE))?;
    run(invocation.command, &conn).await
}

async fn run(command: Command, conn: &Connection) -> Result<()> {
    let mut store = DocumentStore::load(SqliteKeyValueStore::new(conn));

    match command {
        Command::List => {
            let active = store.active_document().id.clone();
            for doc in store.documents() {
                let marker = if doc.id == active { "*" } else { " " };
                println!("{marker} {}\t{}\t{}", doc.id, doc.updated_at, doc.title);
            }
        }
        Command::New => {
            let doc = store.create();
            println!("{}", doc.id);
        }
        Command::Open(id) => {
            if !store.set_active(&id) {
                bail!("no document with id `{id}`");
            }
        }
        Command::Delete(id) => {
            if store.get(&id).is_none() {
                bail!("no document with id `{id}`");
            }
            store.delete(&id);
        }
        Command::Rename(title) => {
            let id = store.active_document().id.clone();
            store.update_title(&id, title);
        }
        Command::Show => {
            let doc = store.active_document();
            println!("# {}", doc.title);
            println!("{}", convert::export_plain_text(&doc.content));
        }
        Command::Import(path) => {
            let imported = convert::import_file(&path)?;
            let doc = store.import_document(imported.title, imported.content);
            println!("{}", doc.id);
        }
        Command::ExportDocx(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(DOCX_EXPORT_FILE_NAME));
            export(&store.active_document().content, &path)?;
        }
        Command::ExportText(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(TEXT_EXPORT_FILE_NAME));
            export(&store.active_document().content, &path)?;
        }
        Command::Improve(selection) => {
            let settings = Settings::load(&SqliteKeyValueStore::new(conn));
            improve(store, &settings, selection).await?;
        }
        Command::ConfigShow => {
            let settings = Settings::load(&SqliteKeyValueStore::new(conn));
            println!("api-key = {}", mask_key(&settings.api_key));
            println!("model = {}", settings.model);
            println!("dark-mode = {}", settings.dark_mode);
        }
        Command::ConfigSet(key, value) => {
            let storage = SqliteKeyValueStore::new(conn);
            let mut settings = Settings::load(&storage);
            settings.apply(key, &value).map_err(|message| anyhow!(message))?;
            settings.save(&storage)?;
        }
        Command::Models | Command::Help => {}
    }
    Ok(())
}

async fn improve<S: KeyValueStore>(
    store: DocumentStore<S>,
    settings: &Settings,
    selection: Option<Selection>,
) -> Result<()> {
    let mut session = EditorSession::open(store, MemorySurface::new());
    if let Some(selection) = selection {
        session.surface().borrow_mut().set_selection(selection);
    }

    let orchestrator = ImproveOrchestrator::from_settings(PolzaClient::new(), settings);
    let outcome = orchestrator
        .improve(session.surface())
        .await
        .map_err(|err| anyhow!("Error improving text: {err}"))?;
    session.sync();

    match outcome {
        ImproveOutcome::Applied(target) => {
            eprintln!("improved {}", target.label());
            let surface = session.surface().borrow();
            println!("{}", surface.document().plain_text());
        }
        ImproveOutcome::SkippedEmpty => eprintln!("nothing to improve"),
        ImproveOutcome::SkippedBusy => eprintln!("another improvement is in progress"),
    }
    Ok(())
}

fn export(content: &str, path: &Path) -> Result<()> {
    convert::export_to_path(content, path)?;
    println!("{}", path.display());
    Ok(())
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        len if len <= 4 => "****".to_string(),
        len => format!("****{}", chars[len - 4..].iter().collect::<String>()),
    }
}

fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match flag {
        Some(dir) => dir,
        None => match std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .ok_or_else(|| anyhow!("no data directory; pass --data-dir or set {DATA_DIR_ENV}"))?
                .join("polza"),
        },
    };
    Ok(std::path::absolute(&dir)?)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation> {
    let mut data_dir = None;
    let mut rest = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => {
                let dir = args.next().ok_or_else(|| anyhow!("--data-dir needs a value"))?;
                data_dir = Some(PathBuf::from(dir));
            }
            _ => rest.push(arg),
        }
    }

    let command = parse_command(&rest)?;
    Ok(Invocation { data_dir, command })
}

fn parse_command(args: &[String]) -> Result<Command> {
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match words.as_slice() {
        [] | ["help" | "--help" | "-h"] => Command::Help,
        ["list"] => Command::List,
        ["new"] => Command::New,
        ["open", id] => Command::Open(id.to_string()),
        ["delete", id] => Command::Delete(id.to_string()),
        ["rename", title @ ..] if !title.is_empty() => Command::Rename(title.join(" ")),
        ["show"] => Command::Show,
        ["import", file] => Command::Import(PathBuf::from(file)),
        ["export-docx"] => Command::ExportDocx(None),
        ["export-docx", path] => Command::ExportDocx(Some(PathBuf::from(path))),
        ["export-txt"] => Command::ExportText(None),
        ["export-txt", path] => Command::ExportText(Some(PathBuf::from(path))),
        ["improve", flags @ ..] => Command::Improve(parse_range(flags)?),
        ["config"] | ["config", "show"] => Command::ConfigShow,
        ["config", "set", key, value @ ..] if !value.is_empty() => {
            let key = SettingKey::parse(key).ok_or_else(|| {
                anyhow!("unknown setting `{key}`; expected api-key, model or dark-mode")
            })?;
            Command::ConfigSet(key, value.join(" "))
        }
        ["models"] => Command::Models,
        _ => bail!("unrecognized arguments `{}`\n\n{USAGE}", words.join(" ")),
    };
    Ok(command)
}

fn parse_range(flags: &[&str]) -> Result<Option<Selection>> {
    let mut from = None;
    let mut to = None;
    let mut flags = flags.iter();
    while let Some(flag) = flags.next() {
        let slot = match *flag {
            "--from" => &mut from,
            "--to" => &mut to,
            other => bail!("unknown improve option `{other}`"),
        };
        let value = flags
            .next()
            .ok_or_else(|| anyhow!("{flag} needs a position"))?
            .parse::<usize>()
            .with_context(|| format!("{flag} expects a non-negative integer"))?;
        *slot = Some(value);
    }

    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => Ok(Some(Selection::range(from, to))),
        _ => bail!("--from and --to must be given together"),
    }
}

#[cfg(test)]
mod tests {
    use super::{mask_key, parse_args, parse_command, Command};
    use polza_core::{Selection, SettingKey};
    use std::path::PathBuf;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn data_dir_flag_is_accepted_anywhere() {
        let invocation = parse_args(words("list --data-dir /tmp/polza")).unwrap();
        assert_eq!(invocation.data_dir, Some(PathBuf::from("/tmp/polza")));
        assert_eq!(invocation.command, Command::List);
    }

    #[test]
    fn improve_range_is_normalized() {
        let command = parse_command(&words("improve --from 9 --to 3")).unwrap();
        assert_eq!(command, Command::Improve(Some(Selection::range(3, 9))));
        assert_eq!(
            parse_command(&words("improve")).unwrap(),
            Command::Improve(None)
        );
        assert!(parse_command(&words("improve --from 2")).is_err());
    }

    #[test]
    fn config_set_joins_the_value() {
        let command = parse_command(&words("config set model openai/gpt-4o")).unwrap();
        assert_eq!(
            command,
            Command::ConfigSet(SettingKey::Model, "openai/gpt-4o".to_string())
        );
        assert!(parse_command(&words("config set colour blue")).is_err());
    }

    #[test]
    fn rename_keeps_spaces_between_words() {
        assert_eq!(
            parse_command(&words("rename Weekly plan")).unwrap(),
            Command::Rename("Weekly plan".to_string())
        );
    }

    #[test]
    fn api_keys_are_masked() {
        assert_eq!(mask_key(""), "(not set)");
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key("sk-123456"), "****3456");
    }
}
