#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI over the unified mail facade. Every command prints one JSON
//! object on stdout; logs go to stderr.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use unimail::service::{
    AttachmentsRequest, DeleteRequest, ForwardRequest, ListRequest, MarkRequest, MoveRequest,
    ReplyRequest, SearchRequest, SendRequest,
};
use unimail::{MailService, MarkAs, OutgoingAttachment, Settings};

#[derive(Parser)]
#[command(name = "unimail")]
#[command(about = "Multi-account mail access with a local sync cache")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Account id or email (`all` for every account where supported)
    #[arg(long, short, global = true)]
    account: Option<String>,

    /// Folder to operate on
    #[arg(long, global = true, default_value = "INBOX")]
    folder: String,
}

#[derive(Subcommand)]
enum Command {
    /// List configured accounts
    Accounts,

    /// Check connectivity of each account
    Check,

    /// List folders of an account
    Folders,

    /// List emails, from the cache when synced
    List {
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,

        /// Show only unread emails
        #[arg(long)]
        unread: bool,

        /// Emails on or after this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        since: Option<NaiveDate>,

        /// Emails before this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        before: Option<NaiveDate>,

        /// Always fetch live
        #[arg(long)]
        no_cache: bool,
    },

    /// Search subject, sender and recipients
    Search {
        query: Option<String>,

        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(long)]
        unread: bool,

        #[arg(long, value_parser = parse_date)]
        since: Option<NaiveDate>,

        #[arg(long, value_parser = parse_date)]
        before: Option<NaiveDate>,
    },

    /// Show a single email by UID
    Show { uid: u32 },

    /// List or save the attachments of an email
    Attachments {
        uid: u32,

        /// Directory to save attachments into
        #[arg(long)]
        save_to: Option<PathBuf>,
    },

    /// Mark emails as read, unread, flagged or unflagged
    Mark {
        #[arg(required = true)]
        ids: Vec<u32>,

        #[arg(long = "as", default_value = "read")]
        mark_as: MarkAs,

        #[arg(long)]
        dry_run: bool,
    },

    /// Delete emails (to trash unless --permanent)
    Delete {
        #[arg(required = true)]
        ids: Vec<u32>,

        #[arg(long)]
        permanent: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Move emails to another folder
    Move {
        #[arg(required = true)]
        ids: Vec<u32>,

        #[arg(long)]
        to: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Send a new email
    Send {
        #[arg(long, required = true)]
        to: Vec<String>,

        #[arg(long)]
        cc: Vec<String>,

        #[arg(long)]
        bcc: Vec<String>,

        #[arg(long)]
        subject: String,

        #[arg(long)]
        body: Option<String>,

        #[arg(long)]
        html: Option<String>,

        /// Files to attach
        #[arg(long)]
        attach: Vec<PathBuf>,
    },

    /// Reply to an email
    Reply {
        uid: u32,

        #[arg(long)]
        body: String,

        #[arg(long)]
        all: bool,
    },

    /// Forward an email
    Forward {
        uid: u32,

        #[arg(long, required = true)]
        to: Vec<String>,

        #[arg(long)]
        cc: Vec<String>,

        #[arg(long)]
        body: Option<String>,
    },

    /// Sync accounts into the cache now
    Sync {
        /// Also prune messages deleted on the server
        #[arg(long)]
        full: bool,
    },

    /// First-time sync of every account
    Init,

    /// Aggregate sync health
    Health,

    /// Per-account sync status and cache size
    Status,

    /// Sync every account on an interval
    Watch {
        /// Seconds between passes
        #[arg(long, default_value = "300")]
        interval: u64,

        /// Stop after this many passes
        #[arg(long)]
        rounds: Option<usize>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date '{s}': {e}"))
}

fn start_of(date: Option<NaiveDate>) -> Option<DateTime<Utc>> {
    date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc())
}

fn attachment(path: PathBuf) -> anyhow::Result<OutgoingAttachment> {
    let data = std::fs::read(&path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    Ok(OutgoingAttachment {
        filename,
        content_type: "application/octet-stream".to_string(),
        data,
    })
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let service = MailService::from_settings(Settings::from_env()?)?;
    let account = args.account.clone();
    let folder = args.folder.clone();

    match args.command {
        Command::Accounts => emit(&service.list_accounts()),
        Command::Check => emit(&service.check_accounts(account.as_deref()).await),
        Command::Folders => emit(&service.list_folders(account.as_deref()).await),
        Command::List {
            limit,
            offset,
            unread,
            since,
            before,
            no_cache,
        } => emit(
            &service
                .list_emails(&ListRequest {
                    account,
                    folder,
                    limit,
                    offset,
                    unread_only: unread,
                    date_from: start_of(since),
                    date_to: start_of(before),
                    use_cache: !no_cache,
                })
                .await,
        ),
        Command::Search {
            query,
            limit,
            offset,
            unread,
            since,
            before,
        } => emit(
            &service
                .search_emails(&SearchRequest {
                    account,
                    folder,
                    query,
                    date_from: start_of(since),
                    date_to: start_of(before),
                    unread_only: unread,
                    limit,
                    offset,
                })
                .await,
        ),
        Command::Show { uid } => emit(&service.show_email(account.as_deref(), &folder, uid).await),
        Command::Attachments { uid, save_to } => emit(
            &service
                .get_attachments(&AttachmentsRequest {
                    account,
                    folder,
                    uid,
                    save_dir: save_to,
                })
                .await,
        ),
        Command::Mark {
            ids,
            mark_as,
            dry_run,
        } => emit(
            &service
                .mark_emails(&MarkRequest {
                    account,
                    folder,
                    ids,
                    mark_as,
                    dry_run,
                })
                .await,
        ),
        Command::Delete {
            ids,
            permanent,
            dry_run,
        } => emit(
            &service
                .delete_emails(&DeleteRequest {
                    account,
                    folder,
                    ids,
                    permanent,
                    dry_run,
                })
                .await,
        ),
        Command::Move { ids, to, dry_run } => emit(
            &service
                .move_emails(&MoveRequest {
                    account,
                    folder,
                    ids,
                    destination: to,
                    dry_run,
                })
                .await,
        ),
        Command::Send {
            to,
            cc,
            bcc,
            subject,
            body,
            html,
            attach,
        } => {
            let attachments = attach
                .into_iter()
                .map(attachment)
                .collect::<anyhow::Result<Vec<_>>>()?;
            emit(
                &service
                    .send_email(&SendRequest {
                        account,
                        to,
                        cc,
                        bcc,
                        subject,
                        text: body,
                        html,
                        attachments,
                        headers: vec![],
                    })
                    .await,
            )
        }
        Command::Reply { uid, body, all } => emit(
            &service
                .reply_email(&ReplyRequest {
                    account,
                    folder,
                    uid,
                    text: body,
                    html: None,
                    reply_all: all,
                })
                .await,
        ),
        Command::Forward { uid, to, cc, body } => emit(
            &service
                .forward_email(&ForwardRequest {
                    account,
                    folder,
                    uid,
                    to,
                    cc,
                    text: body,
                })
                .await,
        ),
        Command::Sync { full } => emit(&service.force_sync(account, full).await),
        Command::Init => emit(&service.init().await),
        Command::Health => emit(&service.health()),
        Command::Status => emit(&service.status()),
        Command::Watch { interval, rounds } => {
            let mut result = Ok(());
            service
                .sync()
                .run_every(Duration::from_secs(interval), rounds, |report| {
                    if result.is_ok() {
                        result = emit(report);
                    }
                })
                .await;
            result
        }
    }
}
