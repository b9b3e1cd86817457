//! aclify - check roles and permissions from the command line
//!
//! Persists a signed-in identity between invocations and evaluates access
//! requirements against it, or against sets given on the command line.
//!
//! ```bash
//! aclify login --identity '{"id":1,"roles":["admin"],"permissions":["read"]}'
//! aclify can --require-role admin
//! aclify check --role user --require-role admin --require-role user --role-mode some
//! aclify logout
//! ```

use std::collections::HashSet;
use std::io::Write;
use std::process::ExitCode;

use aclify::{
    create_aclify, create_aclify_context, load_identity, AccessRequirement, AclifyConfig,
    CanAccess, IdentityProps, MatchMode, Scope, UserAccess, ValidationMode,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const AUTHORIZED: &str = "authorized";
const DENIED: &str = "denied";

#[derive(Parser)]
#[command(name = "aclify", about = "Role and permission gating", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a requirement against roles and permissions given inline
    Check {
        /// Role the user holds (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Permission the user holds (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,

        #[command(flatten)]
        requirement: RequirementArgs,
    },

    /// Evaluate a requirement against the signed-in identity
    Can {
        #[command(flatten)]
        requirement: RequirementArgs,
    },

    /// Persist an identity record (JSON object with `roles` / `permissions` arrays)
    Login {
        #[arg(long)]
        identity: String,
    },

    /// Print the signed-in identity
    Whoami {
        /// Fail on a malformed or unreadable record instead of treating it as signed out
        #[arg(long)]
        strict: bool,
    },

    /// Sign out and remove the persisted record
    Logout,
}

#[derive(Args)]
struct RequirementArgs {
    /// Required role (repeatable)
    #[arg(long = "require-role")]
    required_roles: Vec<String>,

    /// Required permission (repeatable)
    #[arg(long = "require-permission")]
    required_permissions: Vec<String>,

    /// How required roles are matched: all | some
    #[arg(long, default_value = "all")]
    role_mode: MatchMode,

    /// How required permissions are matched: all | some
    #[arg(long, default_value = "all")]
    permission_mode: MatchMode,
}

impl RequirementArgs {
    fn requirement(&self) -> AccessRequirement {
        AccessRequirement::new()
            .with_roles(self.required_roles.iter().cloned())
            .with_permissions(self.required_permissions.iter().cloned())
    }

    fn mode(&self) -> ValidationMode {
        ValidationMode::default()
            .with_roles(self.role_mode)
            .with_permissions(self.permission_mode)
    }
}

/// String tokens in `field` of a JSON identity, empty when signed out.
fn tokens(identity: Option<&Value>, field: &str) -> HashSet<String> {
    identity
        .and_then(|value| value.get(field))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn identity_props(config: &AclifyConfig) -> Result<IdentityProps<Value, String, String>> {
    let store = config.file_store()?;

    Ok(IdentityProps::new(
        store,
        |identity: Option<&Value>| tokens(identity, "roles"),
        |identity: Option<&Value>| tokens(identity, "permissions"),
    )
    .with_storage_key(config.storage_key.clone()))
}

/// Print the gate's verdict; denied maps to a failing exit status.
fn report(out: &mut impl Write, verdict: Option<&str>) -> Result<u8> {
    let text = verdict.unwrap_or(DENIED);
    writeln!(out, "{text}")?;

    Ok(if text == AUTHORIZED { 0 } else { 1 })
}

fn gated(requirement: &RequirementArgs) -> CanAccess<&'static str> {
    CanAccess::new(AUTHORIZED)
        .with_requirement(requirement.requirement())
        .with_validation_mode(requirement.mode())
        .with_fallback(DENIED)
}

/// Read the record back strictly and fail unless it matches `expected`.
fn confirm_persisted(config: &AclifyConfig, expected: Option<&Value>) -> Result<()> {
    let store = config.file_store()?;
    let persisted = load_identity::<Value>(&store, &config.storage_key)
        .with_context(|| format!("could not read back {}", config.storage_key))?;

    if persisted.as_ref() != expected {
        bail!(
            "identity record under {} was not persisted in {}",
            config.storage_key,
            config.storage_dir.display()
        );
    }
    Ok(())
}

fn run(cli: Cli, config: &AclifyConfig, out: &mut impl Write) -> Result<u8> {
    match cli.command {
        Command::Check {
            roles,
            permissions,
            requirement,
        } => {
            let aclify = create_aclify::<String, String>();
            let provided = aclify.provide(&Scope::root(), UserAccess::new(roles, permissions));

            report(
                out,
                aclify.gate().render(provided.scope(), gated(&requirement)),
            )
        }
        Command::Can { requirement } => {
            let aclify = create_aclify_context::<Value, String, String>();
            let provided = aclify.provide(&Scope::root(), identity_props(config)?);

            report(
                out,
                aclify.gate().render(provided.scope(), gated(&requirement)),
            )
        }
        Command::Login { identity } => {
            let identity: Value =
                serde_json::from_str(&identity).context("--identity must be valid JSON")?;

            let aclify = create_aclify_context::<Value, String, String>();
            let provided = aclify.provide(&Scope::root(), identity_props(config)?);
            aclify
                .use_aclify(provided.scope())
                .set_identity(Some(identity.clone()));
            confirm_persisted(config, Some(&identity))?;

            writeln!(out, "signed in")?;
            Ok(0)
        }
        Command::Whoami { strict } => {
            let identity = if strict {
                let store = config.file_store()?;
                load_identity::<Value>(&store, &config.storage_key)?
            } else {
                let aclify = create_aclify_context::<Value, String, String>();
                let provided = aclify.provide(&Scope::root(), identity_props(config)?);
                provided.context().identity()
            };

            match identity {
                Some(identity) => writeln!(out, "{}", serde_json::to_string_pretty(&identity)?)?,
                None => writeln!(out, "anonymous")?,
            }
            Ok(0)
        }
        Command::Logout => {
            let aclify = create_aclify_context::<Value, String, String>();
            let provided = aclify.provide(&Scope::root(), identity_props(config)?);
            aclify.use_aclify(provided.scope()).set_identity(None);
            confirm_persisted(config, None)?;

            writeln!(out, "signed out")?;
            Ok(0)
        }
    }
}

fn main() -> Result<ExitCode> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AclifyConfig::from_env()?;
    let status = run(cli, &config, &mut std::io::stdout().lock())?;

    Ok(ExitCode::from(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aclify::KeyValueStore;
    use std::fs;

    fn config(dir: &tempfile::TempDir) -> AclifyConfig {
        AclifyConfig {
            storage_dir: dir.path().join("state"),
            ..AclifyConfig::default()
        }
    }

    /// Parse `args` and run against `config`, returning status and stdout.
    fn invoke(config: &AclifyConfig, args: &[&str]) -> Result<(u8, String)> {
        let cli = Cli::try_parse_from(std::iter::once("aclify").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        let status = run(cli, config, &mut out)?;

        Ok((status, String::from_utf8(out)?))
    }

    #[test]
    fn test_check_authorized_and_denied() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        let (status, out) =
            invoke(&config, &["check", "--role", "admin", "--require-role", "admin"]).unwrap();
        assert_eq!((status, out.as_str()), (0, "authorized\n"));

        let (status, out) =
            invoke(&config, &["check", "--role", "user", "--require-role", "admin"]).unwrap();
        assert_eq!((status, out.as_str()), (1, "denied\n"));
    }

    #[test]
    fn test_check_role_mode_some() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let args = [
            "check",
            "--role",
            "user",
            "--require-role",
            "admin",
            "--require-role",
            "user",
        ];

        assert_eq!(invoke(&config, &args).unwrap().0, 1);

        let mut some = args.to_vec();
        some.extend(["--role-mode", "some"]);
        assert_eq!(invoke(&config, &some).unwrap().0, 0);
    }

    #[test]
    fn test_unknown_match_mode_rejected() {
        assert!(Cli::try_parse_from(["aclify", "check", "--role-mode", "any"]).is_err());
    }

    #[test]
    fn test_login_whoami_logout_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let identity = r#"{"id":1,"roles":["admin"],"permissions":["read"]}"#;

        assert_eq!(invoke(&config, &["can", "--require-role", "admin"]).unwrap().0, 1);

        let (status, out) = invoke(&config, &["login", "--identity", identity]).unwrap();
        assert_eq!((status, out.as_str()), (0, "signed in\n"));

        let (status, out) = invoke(
            &config,
            &["can", "--require-role", "admin", "--require-permission", "read"],
        )
        .unwrap();
        assert_eq!((status, out.as_str()), (0, "authorized\n"));

        let (_, out) = invoke(&config, &["whoami", "--strict"]).unwrap();
        let shown: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(shown["id"], 1);

        let (status, out) = invoke(&config, &["logout"]).unwrap();
        assert_eq!((status, out.as_str()), (0, "signed out\n"));

        let (_, out) = invoke(&config, &["whoami"]).unwrap();
        assert_eq!(out, "anonymous\n");
    }

    #[test]
    fn test_login_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();

        assert!(invoke(&config(&dir), &["login", "--identity", "{not json"]).is_err());
    }

    #[test]
    fn test_login_fails_when_record_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        // A directory where the record file should go makes every write fail
        let store = config.file_store().unwrap();
        fs::create_dir_all(store.path_for(&config.storage_key)).unwrap();

        let result = invoke(&config, &["login", "--identity", r#"{"id":1}"#]);

        assert!(result.is_err());
    }

    #[test]
    fn test_whoami_strict_fails_on_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);

        let store = config.file_store().unwrap();
        store.set(&config.storage_key, "{broken").unwrap();

        let (status, out) = invoke(&config, &["whoami"]).unwrap();
        assert_eq!((status, out.as_str()), (0, "anonymous\n"));

        assert!(invoke(&config, &["whoami", "--strict"]).is_err());
    }
}
