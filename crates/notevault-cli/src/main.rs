//! # notevault CLI
//!
//! A terminal client for the notevault engine. The engine itself has no
//! notion of a command line: it expects a UI to hand it the whole note list
//! on every save. This binary plays that UI role, so each mutating command is
//! a read-modify-write cycle:
//!
//! ```text
//! load()  ──►  edit the list in memory  ──►  save(list)  ──►  backup scheduled
//! ```
//!
//! ## Backups On Exit
//!
//! The engine debounces git backups, which would never fire in a process
//! that exits right after saving. Before exiting, the CLI flushes any pending
//! backup and waits for the pass to finish. `--no-backup` skips that step
//! (the vault is still marked dirty and the next run picks it up).
//!
//! ## Output
//!
//! Human-readable by default; `--json` prints the engine's structures
//! (`NoteRecord`, `SaveReport`, `BackupState`) as JSON for scripting.
//!
//! ## Logging
//!
//! Logs go to stderr through `tracing-subscriber`. `-v` enables debug
//! output; otherwise `RUST_LOG` applies, defaulting to warnings.

mod cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
