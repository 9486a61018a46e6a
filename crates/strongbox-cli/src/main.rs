//! strongbox
//!
//! Command-line surface over the key-custody core. Every command takes the
//! data root directory first:
//!
//!   strongbox <rootDir> sign-in <user> <pass>
//!   strongbox <rootDir> account-create <user> <pass>
//!   strongbox <rootDir> recovery2-setup <user> <pass> [<question> <answer>]...
//!
//! Exit code is 0 on success and 1 on any failure, with a one-line message
//! on stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};

use strongbox_account::cache::{cache_login_password, cache_login_store};
use strongbox_account::sync::{LocalSync, SyncRepo};
use strongbox_core::{Context, ContextHandle};
use strongbox_crypto::encoding::{base16_decode, base16_encode, base58_decode, base58_encode};
use strongbox_crypto::JsonBox;
use strongbox_login::password::login_password_set;
use strongbox_login::recovery::{login_recovery, login_recovery_questions, login_recovery_set};
use strongbox_login::recovery2::{
    login_recovery2, login_recovery2_key, login_recovery2_questions, login_recovery2_set,
};
use strongbox_login::server::LoginServer;
use strongbox_login::Login;

// Build-time constants. The API key identifies this client to the auth
// server; there is no environment-variable configuration.
const API_KEY: &str = "57e2e6e2e9f7f4d1c2a9f8b3a4e5d6c7";
const HIDDEN_BITS_KEY: Option<&str> = None;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "strongbox", version, about = "Strongbox key-custody tool")]
struct Args {
    /// Data root directory (accounts, logs, repos).
    root_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a username is still available on the server.
    AccountAvailable { user: String },

    /// Create a new account with a password (and a default PIN).
    AccountCreate { user: String, pass: String },

    /// List the accounts present in the local data directory.
    AccountList,

    /// Decrypt an account-relative file and print the plaintext.
    AccountDecrypt {
        user: String,
        pass: String,
        file: String,
    },

    /// Encrypt an account-relative file and print the box JSON.
    AccountEncrypt {
        user: String,
        pass: String,
        file: String,
    },

    /// Print the account's recovery questions.
    RecoveryQuestions { user: String },

    /// Print the server's catalog of suggested recovery questions.
    RecoveryQuestionChoices,

    /// Log in with the v1 recovery answers string.
    RecoveryLogin { user: String, answers: String },

    /// Log in with the v1 answers, then set a new password.
    RecoveryChangePassword {
        user: String,
        answers: String,
        new_pass: String,
    },

    /// Install v1 recovery questions and answers.
    RecoverySetup {
        user: String,
        pass: String,
        questions: String,
        answers: String,
    },

    /// Print the questions protected by a recovery2 key.
    Recovery2Questions {
        user: String,
        recovery2_key: String,
    },

    /// Print the account's recovery2 key (requires the password).
    Recovery2Key { user: String, pass: String },

    /// Log in by answering the recovery2 questions.
    Recovery2Login {
        user: String,
        recovery2_key: String,
        answers: Vec<String>,
    },

    /// Log in with recovery2, then set a new password.
    Recovery2ChangePassword {
        user: String,
        recovery2_key: String,
        new_pass: String,
        answers: Vec<String>,
    },

    /// Install recovery2 questions and answers; prints the new key.
    Recovery2Setup {
        user: String,
        pass: String,
        questions_and_answers: Vec<String>,
    },

    /// Create a local checkout of a sync repository.
    RepoClone { sync_key: String },

    /// Sync a local repository checkout.
    RepoSync { sync_key: String },

    /// Log in with a password.
    SignIn { user: String, pass: String },
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let line = err.to_string();
            eprintln!("{}", line.lines().next().unwrap_or("bad arguments"));
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut context = Context::new(&args.root_dir, API_KEY);
    context.hidden_bits_key = HIDDEN_BITS_KEY.map(str::to_owned);
    let ctx = strongbox_login::initialize(context, &[])?;

    match args.command {
        Command::AccountAvailable { user } => {
            let store = cache_login_store(&ctx, &user)?;
            LoginServer::new(&ctx)?.account_available(&store)?;
            println!("Username is available");
            Ok(())
        }

        Command::AccountCreate { user, pass } => cmd_account_create(&ctx, &user, &pass),

        Command::AccountList => {
            for username in strongbox_login::paths::account_list(&ctx)? {
                println!("{username}");
            }
            Ok(())
        }

        Command::AccountDecrypt { user, pass, file } => {
            let login = sign_in(&ctx, &user, &pass)?;
            let boxed = JsonBox::load(&login.paths.dir().join(&file))?;
            let data = boxed.decrypt(login.data_key())?;
            println!("{}", String::from_utf8_lossy(&data));
            Ok(())
        }

        Command::AccountEncrypt { user, pass, file } => {
            let login = sign_in(&ctx, &user, &pass)?;
            let data = strongbox_core::fileio::file_load(&login.paths.dir().join(&file))?;
            let boxed = JsonBox::encrypt(&data, login.data_key())?;
            println!("{}", serde_json::to_string_pretty(&boxed)?);
            Ok(())
        }

        Command::RecoveryQuestions { user } => {
            let store = cache_login_store(&ctx, &user)?;
            println!("{}", login_recovery_questions(&store)?);
            Ok(())
        }

        Command::RecoveryQuestionChoices => {
            let choices = LoginServer::new(&ctx)?.questions()?;
            let rows = choices
                .as_array()
                .context("malformed question list from server")?;
            for row in rows {
                println!(
                    "{} ({}, {})",
                    row["question"].as_str().unwrap_or("?"),
                    row["category"].as_str().unwrap_or("?"),
                    row["min_length"].as_i64().unwrap_or(0),
                );
            }
            Ok(())
        }

        Command::RecoveryLogin { user, answers } => {
            let store = cache_login_store(&ctx, &user)?;
            login_recovery(&store, &answers)?;
            Ok(())
        }

        Command::RecoveryChangePassword {
            user,
            answers,
            new_pass,
        } => {
            let store = cache_login_store(&ctx, &user)?;
            let login = login_recovery(&store, &answers)?;
            login_password_set(&login, &new_pass)?;
            Ok(())
        }

        Command::RecoverySetup {
            user,
            pass,
            questions,
            answers,
        } => {
            let login = sign_in(&ctx, &user, &pass)?;
            login_recovery_set(&login, &questions, &answers)?;
            Ok(())
        }

        Command::Recovery2Questions {
            user,
            recovery2_key,
        } => {
            let store = cache_login_store(&ctx, &user)?;
            let key = base58_decode(&recovery2_key)?;
            for question in login_recovery2_questions(&store, &key)? {
                println!("{question}");
            }
            Ok(())
        }

        Command::Recovery2Key { user, pass } => {
            let login = sign_in(&ctx, &user, &pass)?;
            let key = login_recovery2_key(&login.paths)?;
            println!("{}", base58_encode(&key));
            Ok(())
        }

        Command::Recovery2Login {
            user,
            recovery2_key,
            answers,
        } => {
            let store = cache_login_store(&ctx, &user)?;
            let key = base58_decode(&recovery2_key)?;
            login_recovery2(&store, &key, &answers)?;
            Ok(())
        }

        Command::Recovery2ChangePassword {
            user,
            recovery2_key,
            new_pass,
            answers,
        } => {
            let store = cache_login_store(&ctx, &user)?;
            let key = base58_decode(&recovery2_key)?;
            let login = login_recovery2(&store, &key, &answers)?;
            login_password_set(&login, &new_pass)?;
            Ok(())
        }

        Command::Recovery2Setup {
            user,
            pass,
            questions_and_answers,
        } => cmd_recovery2_setup(&ctx, &user, &pass, &questions_and_answers),

        Command::RepoClone { sync_key } => {
            let dir = repo_dir(&ctx, &sync_key)?;
            LocalSync.checkout(&dir, &base16_decode(&sync_key)?)?;
            println!("Cloned to {}", dir.display());
            Ok(())
        }

        Command::RepoSync { sync_key } => {
            let dir = repo_dir(&ctx, &sync_key)?;
            let key = base16_decode(&sync_key)?;
            let dirty = LocalSync.pull(&dir, &key)?;
            LocalSync.push(&dir, &key)?;
            println!("{}", if dirty { "Updated" } else { "Up to date" });
            Ok(())
        }

        Command::SignIn { user, pass } => {
            sign_in(&ctx, &user, &pass)?;
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_account_create(ctx: &ContextHandle, user: &str, pass: &str) -> anyhow::Result<()> {
    let login = strongbox_account::cache::cache_login_new(ctx, user, Some(pass))?;

    // New accounts start with a default PIN. This writes the v1 package;
    // the first PIN login upgrades it to v2.
    strongbox_login::pin::login_pin_set(&login, "1234")?;
    Ok(())
}

fn cmd_recovery2_setup(
    ctx: &ContextHandle,
    user: &str,
    pass: &str,
    questions_and_answers: &[String],
) -> anyhow::Result<()> {
    if questions_and_answers.is_empty() || questions_and_answers.len() % 2 != 0 {
        bail!("recovery2-setup needs question/answer pairs");
    }
    let questions: Vec<String> = questions_and_answers
        .chunks(2)
        .map(|pair| pair[0].clone())
        .collect();
    let answers: Vec<String> = questions_and_answers
        .chunks(2)
        .map(|pair| pair[1].clone())
        .collect();

    let login = sign_in(ctx, user, pass)?;
    let key = login_recovery2_set(&login, &questions, &answers)?;
    println!("{}", base58_encode(&key));
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn sign_in(
    ctx: &ContextHandle,
    user: &str,
    pass: &str,
) -> anyhow::Result<std::sync::Arc<Login>> {
    Ok(cache_login_password(ctx, user, pass)?)
}

fn repo_dir(ctx: &ContextHandle, sync_key: &str) -> anyhow::Result<PathBuf> {
    let key = base16_decode(sync_key)?;
    if key.len() != strongbox_core::constants::SYNC_KEY_LENGTH {
        bail!("sync key must be 20 bytes of hex");
    }
    Ok(ctx.root_dir().join("repos").join(base16_encode(&key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_follow_the_documented_surface() {
        let args =
            Args::try_parse_from(["strongbox", "/tmp/data", "sign-in", "alice", "pw"]).unwrap();
        assert!(matches!(args.command, Command::SignIn { .. }));

        let args = Args::try_parse_from([
            "strongbox",
            "/tmp/data",
            "recovery2-setup",
            "alice",
            "pw",
            "q1",
            "a1",
            "q2",
            "a2",
        ])
        .unwrap();
        match args.command {
            Command::Recovery2Setup {
                questions_and_answers,
                ..
            } => assert_eq!(questions_and_answers.len(), 4),
            other => panic!("wrong command: {other:?}"),
        }

        let args = Args::try_parse_from([
            "strongbox",
            "/tmp/data",
            "recovery2-login",
            "alice",
            "2JzK9",
            "a1",
            "a2",
        ])
        .unwrap();
        match args.command {
            Command::Recovery2Login { answers, .. } => assert_eq!(answers.len(), 2),
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn root_dir_comes_first() {
        let args =
            Args::try_parse_from(["strongbox", "/data/root", "account-list"]).unwrap();
        assert_eq!(args.root_dir, PathBuf::from("/data/root"));
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(Args::try_parse_from(["strongbox", "/tmp/data", "sign-in", "alice"]).is_err());
        assert!(Args::try_parse_from(["strongbox"]).is_err());
    }
}
