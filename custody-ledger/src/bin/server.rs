//! Custody ledger server binary
//!
//! Reads one JSON request per line on stdin and writes one JSON response per
//! line on stdout. Logs go to stderr.
//!
//! State-changing requests must be [`SignedCommand`] envelopes
//! (`{"command": {...}, "nonce", "public_key", "signature"}`); the acting
//! account is the one derived from the signing key. Reads are plain
//! `{"op": ...}` objects.

use anyhow::Context;
use custody_ledger::{
    actor::spawn_ledger_actor, config::DenominationConfig, metrics::Metrics, AccountId, Amount,
    Authenticator, Config, Error, EventFilter, Ledger, LedgerHandle, SignedCommand,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Read-only request
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Query {
    Balance { account: AccountId },
    Allowance { owner: AccountId, spender: AccountId },
    IsAdmin { account: AccountId },
    Admins,
    Custody,
    Events {
        #[serde(default)]
        filter: EventFilter,
    },
}

/// Request loop state
struct Server {
    handle: LedgerHandle,
    auth: Authenticator,
    denomination: DenominationConfig,
}

impl Server {
    fn new(handle: LedgerHandle, denomination: DenominationConfig) -> Self {
        Self {
            handle,
            auth: Authenticator::new(),
            denomination,
        }
    }

    /// Answer one request line
    async fn handle_line(&mut self, line: &str) -> Value {
        let request: Value = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => return bad_request(e),
        };

        let result = if request.get("command").is_some() {
            match SignedCommand::deserialize(request) {
                Ok(signed) => self.submit(signed).await,
                Err(e) => return bad_request(e),
            }
        } else {
            match Query::deserialize(&request) {
                Ok(query) => self.query(query).await,
                Err(e) if is_bare_command(&request) => {
                    tracing::debug!(error = %e, "Unsigned command");
                    Err(Error::SignatureError(
                        "commands must be sent as signed envelopes".to_string(),
                    ))
                }
                Err(e) => return bad_request(e),
            }
        };

        match result {
            Ok(value) => value,
            Err(e) => json!({ "ok": false, "error": e.code(), "message": e.to_string() }),
        }
    }

    async fn submit(&mut self, signed: SignedCommand) -> custody_ledger::Result<Value> {
        let command = self.auth.authenticate(signed)?;
        let event = self.handle.submit(command).await?;
        Ok(json!({ "ok": true, "event": event }))
    }

    async fn query(&self, query: Query) -> custody_ledger::Result<Value> {
        let value = match query {
            Query::Balance { account } => {
                let balance = self.handle.balance_of(account).await?;
                json!({ "ok": true, "balance": balance, "display": self.display(balance) })
            }
            Query::Allowance { owner, spender } => {
                json!({ "ok": true, "allowance": self.handle.allowance(owner, spender).await? })
            }
            Query::IsAdmin { account } => {
                json!({ "ok": true, "is_admin": self.handle.is_admin(account).await? })
            }
            Query::Admins => {
                json!({ "ok": true, "admins": self.handle.admins().await? })
            }
            Query::Custody => {
                let custody = self.handle.custody_balance().await?;
                json!({ "ok": true, "custody": custody, "display": self.display(custody) })
            }
            Query::Events { filter } => {
                json!({ "ok": true, "events": self.handle.query_events(filter).await? })
            }
        };

        Ok(value)
    }

    /// Amount in display units, e.g. `1.5 ETH`
    fn display(&self, amount: Amount) -> Option<String> {
        amount
            .to_units(self.denomination.decimals)
            .map(|units| format!("{} {}", units, self.denomination.symbol))
    }
}

fn bad_request(e: serde_json::Error) -> Value {
    json!({ "ok": false, "error": "bad_request", "message": e.to_string() })
}

/// Whether `request` names a command op outside a signed envelope
fn is_bare_command(request: &Value) -> bool {
    matches!(
        request.get("op").and_then(Value::as_str),
        Some(
            "deposit"
                | "withdraw"
                | "transfer"
                | "transfer_from"
                | "approve"
                | "increase_allowance"
                | "decrease_allowance"
                | "add_admin"
                | "remove_admin"
        )
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    init_tracing(&config);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting custody ledger server"
    );

    let metrics = Metrics::new().context("registering metrics")?;
    let ledger = Ledger::from_config(&config)?.with_metrics(metrics);
    if let Some(public_key) = ledger.public_key() {
        tracing::info!(public_key = %hex::encode(public_key), "Signing audit events");
    }

    let handle = spawn_ledger_actor(ledger, config.actor.mailbox_capacity);
    let mut server = Server::new(handle.clone(), config.denomination.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let response = server.handle_line(&line).await;
                stdout.write_all(response.to_string().as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    handle.check_invariants().await?;
    let ledger = handle.shutdown().await?;
    tracing::info!(
        events = ledger.events().len(),
        custody = %ledger.custody_balance(),
        "Shutting down custody ledger server"
    );

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
