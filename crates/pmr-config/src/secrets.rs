//! Session secret resolution.
//!
//! Config YAML stores only env var NAMES. Callers resolve them once, at
//! startup, with [`resolve_session_secrets`] and hand the result to source
//! construction; nothing else reads the environment.
//!
//! - `Debug` on [`ResolvedSession`] redacts values.
//! - Errors name the variable, never its value.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::settings::SourceSpec;

/// Session values for one configured source, in the same order as `sources`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedSession {
    pub token: Option<String>,
    pub cookie: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl std::fmt::Debug for ResolvedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        f.debug_struct("ResolvedSession")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("cookie", &self.cookie.as_ref().map(|_| "<REDACTED>"))
            .field("headers", &header_names)
            .finish()
    }
}

/// Unset and blank both count as missing.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every source's session variables from the process environment.
///
/// # Errors
/// The first unset variable of a source marked `required: true`, by name.
pub fn resolve_session_secrets(sources: &[SourceSpec]) -> Result<Vec<ResolvedSession>> {
    resolve_session_secrets_with(sources, resolve_env)
}

/// [`resolve_session_secrets`] with an explicit lookup, so callers (and
/// tests) need not mutate the process environment.
pub fn resolve_session_secrets_with<F>(
    sources: &[SourceSpec],
    lookup: F,
) -> Result<Vec<ResolvedSession>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = Vec::with_capacity(sources.len());
    for (i, spec) in sources.iter().enumerate() {
        let names = &spec.session_env;
        let mut resolved = ResolvedSession::default();
        let mut missing: Option<&str> = None;

        if let Some(var) = names.token.as_deref() {
            resolved.token = lookup(var);
            if resolved.token.is_none() {
                missing = missing.or(Some(var));
            }
        }
        if let Some(var) = names.cookie.as_deref() {
            resolved.cookie = lookup(var);
            if resolved.cookie.is_none() {
                missing = missing.or(Some(var));
            }
        }
        for (header, var) in &names.headers {
            match lookup(var) {
                Some(v) => {
                    resolved.headers.insert(header.clone(), v);
                }
                None => missing = missing.or(Some(var.as_str())),
            }
        }

        if let (true, Some(var)) = (spec.required, missing) {
            bail!(
                "SECRETS_MISSING source={i} kind={}: required env var '{var}' is not set or empty",
                spec.kind
            );
        }
        out.push(resolved);
    }
    Ok(out)
}
