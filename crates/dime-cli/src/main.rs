//! DiME CLI: `dime` command.
//!
//! Generates keys, requests and issues identities, verifies trust chains
//! and inspects encoded items. Everything is stored as exported item text
//! under a home directory.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use uuid::Uuid;

use dime::{
    Capability, DimeItem, Identity, IdentityIssuingRequest, IssuePolicy, Item, Key,
    KeyCapability, KeyRing,
};

const DAY: i64 = 24 * 60 * 60;

// ── Storage helpers ──────────────────────────────────────────────────────────

struct Home {
    root: PathBuf,
}

impl Home {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.root.join("keys").join(format!("{name}.key"))
    }

    fn request_path(&self, name: &str) -> PathBuf {
        self.root.join("requests").join(format!("{name}.iir"))
    }

    fn identity_path(&self, name: &str) -> PathBuf {
        self.root.join("identities").join(format!("{name}.id"))
    }

    fn load_key(&self, name: &str) -> Result<Key> {
        match read_item(&self.key_path(name))? {
            Item::Key(key) => Ok(key),
            other => bail!("'{name}' holds a {} item, not a key", other.header()),
        }
    }

    fn load_identity(&self, name: &str) -> Result<Identity> {
        match read_item(&self.identity_path(name))? {
            Item::Identity(identity) => Ok(identity),
            other => bail!("'{name}' holds a {} item, not an identity", other.header()),
        }
    }
}

fn read_item(path: &Path) -> Result<Item> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Item::import(text.trim()).with_context(|| format!("failed to decode {}", path.display()))
}

fn write_item(path: &Path, item: impl Into<Item>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let exported = item.into().export().context("failed to encode item")?;
    std::fs::write(path, format!("{exported}\n"))
        .with_context(|| format!("failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn non_empty(values: &[String]) -> Option<&[String]> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// DiME CLI: generate keys, issue identities and verify trust chains.
#[derive(Parser, Debug)]
#[command(
    name = "dime",
    about = "DiME CLI",
    version,
    long_about = "dime: Data Integrity Message Envelope CLI\n\nGenerate keys, request and issue identities,\nverify trust chains and inspect encoded items."
)]
struct Cli {
    /// Directory holding keys, requests and identities
    #[arg(long, global = true, env = "DIME_HOME", default_value = ".dime")]
    home: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage keys
    Key {
        #[command(subcommand)]
        subcommand: KeyCommands,
    },

    /// Manage identity issuing requests
    Request {
        #[command(subcommand)]
        subcommand: RequestCommands,
    },

    /// Issue and verify identities
    Identity {
        #[command(subcommand)]
        subcommand: IdentityCommands,
    },

    /// Print the header, unique id and claims of an exported item
    Inspect {
        /// Path to an exported item
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommands {
    /// Generate a new key
    Generate {
        /// Name to store the key under
        #[arg(long)]
        name: String,

        /// Key capability (sign, exchange, encrypt)
        #[arg(long, default_value = "sign")]
        capability: KeyCapability,
    },
}

#[derive(Subcommand, Debug)]
enum RequestCommands {
    /// Create a signed identity issuing request for a stored key
    Generate {
        /// Name of a stored sign key
        #[arg(long)]
        key: String,

        /// Requested capabilities (repeatable)
        #[arg(long = "capability", value_delimiter = ',')]
        capabilities: Vec<Capability>,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Self-issue a root identity
    SelfIssue {
        /// Name of a stored sign key
        #[arg(long)]
        key: String,

        /// Name to store the identity under
        #[arg(long)]
        name: String,

        /// Validity in days
        #[arg(long, default_value_t = 365)]
        days: i64,

        /// System name carried by the identity and everything it issues
        #[arg(long, default_value = "dime")]
        system: String,

        /// Ambits the identity is valid in (repeatable)
        #[arg(long = "ambit")]
        ambits: Vec<String>,
    },

    /// Issue an identity from a request file
    Issue {
        /// Path to an exported identity issuing request
        #[arg(long)]
        request: PathBuf,

        /// Name of the issuing identity
        #[arg(long)]
        issuer: String,

        /// Name of the issuer's sign key
        #[arg(long)]
        issuer_key: String,

        /// Name to store the issued identity under
        #[arg(long)]
        name: String,

        /// Validity in days
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Capabilities the issuer allows (repeatable)
        #[arg(long = "allow", value_delimiter = ',', default_value = "generic,identify")]
        allowed: Vec<Capability>,

        /// Trusted root identities; the chain is not embedded above these
        #[arg(long = "root")]
        roots: Vec<String>,

        /// Embed the issuer's trust chain
        #[arg(long)]
        chain: bool,

        /// Ambits to add (repeatable)
        #[arg(long = "ambit")]
        ambits: Vec<String>,
    },

    /// Verify a stored identity and print its integrity state
    Verify {
        /// Name of the identity to verify
        #[arg(long)]
        name: String,

        /// Trusted root identities (repeatable)
        #[arg(long = "root")]
        roots: Vec<String>,

        /// Verify against this identity instead of the roots
        #[arg(long)]
        trusted: Option<String>,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let home = Home::new(cli.home);
    let result = match cli.command {
        Commands::Key { subcommand } => match subcommand {
            KeyCommands::Generate { name, capability } => cmd_key_generate(&home, &name, capability),
        },
        Commands::Request { subcommand } => match subcommand {
            RequestCommands::Generate { key, capabilities } => {
                cmd_request_generate(&home, &key, &capabilities)
            }
        },
        Commands::Identity { subcommand } => match subcommand {
            IdentityCommands::SelfIssue {
                key,
                name,
                days,
                system,
                ambits,
            } => cmd_identity_self_issue(&home, &key, &name, days, &system, &ambits),
            IdentityCommands::Issue {
                request,
                issuer,
                issuer_key,
                name,
                days,
                allowed,
                roots,
                chain,
                ambits,
            } => cmd_identity_issue(
                &home,
                &request,
                &issuer,
                &issuer_key,
                &name,
                days,
                &allowed,
                &roots,
                chain,
                &ambits,
            ),
            IdentityCommands::Verify {
                name,
                roots,
                trusted,
            } => cmd_identity_verify(&home, &name, &roots, trusted.as_deref()),
        },
        Commands::Inspect { file } => cmd_inspect(&file),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

// ── Command implementations ──────────────────────────────────────────────────

fn cmd_key_generate(home: &Home, name: &str, capability: KeyCapability) -> Result<()> {
    let path = home.key_path(name);
    if path.exists() {
        bail!("key '{name}' already exists at {}", path.display());
    }
    let key = Key::generate(capability).context("failed to generate key")?;
    let unique_id = key.unique_id()?;
    let public = key.public()?.unwrap_or_default();
    write_item(&path, key)?;

    println!("Key generated");
    println!("  Name:       {name}");
    println!("  Capability: {capability}");
    println!("  ID:         {unique_id}");
    println!("  Public:     {public}");
    println!("  Stored:     {}", path.display());
    Ok(())
}

fn cmd_request_generate(home: &Home, key_name: &str, capabilities: &[Capability]) -> Result<()> {
    let key = home.load_key(key_name)?;
    let request = IdentityIssuingRequest::generate(&key, capabilities, None)
        .context("failed to generate request")?;
    let path = home.request_path(key_name);
    let names: Vec<String> = request.capabilities()?.iter().map(|c| c.to_string()).collect();
    write_item(&path, request)?;

    println!("Request generated");
    println!("  Capabilities: {}", names.join(", "));
    println!("  Stored:       {}", path.display());
    Ok(())
}

fn cmd_identity_self_issue(
    home: &Home,
    key_name: &str,
    name: &str,
    days: i64,
    system: &str,
    ambits: &[String],
) -> Result<()> {
    let key = home.load_key(key_name)?;
    let valid_for = validity_seconds(days)?;
    let identity = IdentityIssuingRequest::generate(&key, &[Capability::Generic, Capability::Issue], None)
        .context("failed to generate request")?
        .self_issue(Uuid::new_v4(), valid_for, &key, system, non_empty(ambits), None)
        .context("failed to self-issue identity")?;
    print_identity("Identity self-issued", name, &identity)?;
    write_item(&home.identity_path(name), identity)
}

fn validity_seconds(days: i64) -> Result<i64> {
    days.checked_mul(DAY)
        .ok_or_else(|| anyhow!("{days} days is out of range"))
}

#[allow(clippy::too_many_arguments)]
fn cmd_identity_issue(
    home: &Home,
    request_path: &Path,
    issuer_name: &str,
    issuer_key_name: &str,
    name: &str,
    days: i64,
    allowed: &[Capability],
    roots: &[String],
    chain: bool,
    ambits: &[String],
) -> Result<()> {
    let request = match read_item(request_path)? {
        Item::IssuingRequest(request) => request,
        other => bail!(
            "{} holds a {} item, not a request",
            request_path.display(),
            other.header()
        ),
    };
    let issuer = home.load_identity(issuer_name)?;
    let issuer_key = home.load_key(issuer_key_name)?;
    let key_ring = load_ring(home, roots)?;
    let ambits: Vec<&str> = ambits.iter().map(String::as_str).collect();
    let mut policy = IssuePolicy::new(allowed).ambits(&ambits);
    if !roots.is_empty() {
        policy = policy.key_ring(&key_ring);
    }
    let valid_for = validity_seconds(days)?;

    let identity = request
        .issue(Uuid::new_v4(), valid_for, &issuer_key, &issuer, chain, &policy)
        .context("failed to issue identity")?;
    print_identity("Identity issued", name, &identity)?;
    write_item(&home.identity_path(name), identity)
}

fn cmd_identity_verify(
    home: &Home,
    name: &str,
    roots: &[String],
    trusted: Option<&str>,
) -> Result<()> {
    let identity = home.load_identity(name)?;
    let key_ring = load_ring(home, roots)?;
    let trusted = trusted.map(|t| home.load_identity(t)).transpose()?;

    let state = identity.verify(&key_ring, trusted.as_ref());
    println!("{state}");
    if !state.is_valid() {
        return Err(anyhow!("identity '{name}' did not verify: {state}"));
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let item = read_item(path)?;
    println!("Header:     {}", item.header());
    println!("ID:         {}", item.unique_id()?);
    println!("Signed:     {}", if item.is_sealed() { "yes" } else { "no" });
    println!("Thumbprint: {}", item.thumbprint()?);
    println!("Claims:");
    for (tag, value) in item.claims().iter() {
        println!("  {tag}: {value}");
    }
    Ok(())
}

fn load_ring(home: &Home, roots: &[String]) -> Result<KeyRing> {
    let key_ring = KeyRing::new();
    if !roots.is_empty() {
        let identities = roots
            .iter()
            .map(|r| home.load_identity(r))
            .collect::<Result<Vec<_>>>()?;
        key_ring.init(identities);
    }
    Ok(key_ring)
}

fn print_identity(title: &str, name: &str, identity: &Identity) -> Result<()> {
    let capabilities: Vec<String> = identity
        .capabilities()?
        .iter()
        .map(|c| c.to_string())
        .collect();
    println!("{title}");
    println!("  Name:         {name}");
    println!("  Subject:      {}", identity.subject_id()?);
    println!("  Issuer:       {}", identity.issuer_id()?);
    println!("  Capabilities: {}", capabilities.join(", "));
    if let Some(expires) = identity.expires_at()? {
        println!("  Expires:      {}", expires.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}
