use std::collections::HashMap;
use std::ffi::OsString;

pub use clap::Parser;

use crate::error::AuthError;
use crate::models::auth::{KIND_API_KEY, KIND_BASIC, KIND_BEARER, KIND_NONE};
use crate::models::AuthStrategy;

#[derive(Parser, Debug)]
#[command(version, about = "Send one HTTP request and record the result", long_about = None)]
struct ClapArgs {
    /// Profile name to load settings and default headers from.
    #[clap(short = 'p', long, default_value = "default", help = "profile name")]
    profile: String,

    #[clap(short = 'X', long, default_value = "GET", help = "HTTP method")]
    method: String,

    #[clap(short = 'H', long = "header", value_name = "NAME: VALUE", help = "request header, repeatable")]
    headers: Vec<String>,

    #[clap(short = 'q', long = "query", value_name = "NAME=VALUE", help = "query parameter, repeatable")]
    query: Vec<String>,

    #[clap(short = 'd', long, help = "request body (POST, PUT and PATCH only)")]
    data: Option<String>,

    #[clap(short = 'n', long, help = "name recorded with the request")]
    name: Option<String>,

    #[clap(long, value_name = "USER:PASS", conflicts_with_all = ["bearer", "api_key"], help = "basic auth credentials")]
    basic: Option<String>,

    #[clap(long, value_name = "TOKEN", conflicts_with = "api_key", help = "bearer token")]
    bearer: Option<String>,

    #[clap(long = "api-key", value_name = "NAME=VALUE", help = "API key")]
    api_key: Option<String>,

    #[clap(long = "api-key-in", default_value = "header", value_name = "header|query", help = "where to send the API key")]
    api_key_in: String,

    #[clap(short = 'v', long, help = "print status line and headers")]
    verbose: bool,

    #[clap(long, value_name = "N", help = "list the N most recent history entries (0 for all) instead of sending")]
    history: Option<usize>,

    #[clap(long = "no-history", help = "do not record this request")]
    no_history: bool,

    #[clap(short = 's', long, help = "save the request before sending it")]
    save: bool,

    #[clap(long, conflicts_with = "history", help = "list saved requests instead of sending")]
    saved: bool,

    #[clap(long, value_name = "ID", conflicts_with_all = ["history", "saved", "url"], help = "send a saved request")]
    run: Option<String>,

    #[clap(long = "delete-saved", value_name = "ID", conflicts_with_all = ["history", "saved", "run"], help = "delete a saved request")]
    delete_saved: Option<String>,

    #[clap(help = "request URL", required_unless_present_any = ["history", "saved", "run", "delete_saved"])]
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandLineArgs {
    profile: String,
    method: String,
    headers: Vec<String>,
    query: Vec<String>,
    data: Option<String>,
    name: Option<String>,
    basic: Option<String>,
    bearer: Option<String>,
    api_key: Option<String>,
    api_key_in: String,
    verbose: bool,
    history: Option<usize>,
    no_history: bool,
    save: bool,
    saved: bool,
    run: Option<String>,
    delete_saved: Option<String>,
    url: Option<String>,
}

impl From<ClapArgs> for CommandLineArgs {
    fn from(args: ClapArgs) -> Self {
        Self {
            profile: args.profile,
            method: args.method,
            headers: args.headers,
            query: args.query,
            data: args.data,
            name: args.name,
            basic: args.basic,
            bearer: args.bearer,
            api_key: args.api_key,
            api_key_in: args.api_key_in,
            verbose: args.verbose,
            history: args.history,
            no_history: args.no_history,
            save: args.save,
            saved: args.saved,
            run: args.run,
            delete_saved: args.delete_saved,
            url: args.url,
        }
    }
}

impl CommandLineArgs {
    pub fn parse() -> Self {
        ClapArgs::parse().into()
    }

    pub fn parse_from<I, T>(itr: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        ClapArgs::parse_from(itr).into()
    }

    pub fn profile(&self) -> &String {
        &self.profile
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn history(&self) -> Option<usize> {
        self.history
    }

    pub fn no_history(&self) -> bool {
        self.no_history
    }

    pub fn save(&self) -> bool {
        self.save
    }

    /// True when saved requests should be listed.
    pub fn list_saved(&self) -> bool {
        self.saved
    }

    /// Id of the saved request to send.
    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    pub fn delete_saved(&self) -> Option<&str> {
        self.delete_saved.as_deref()
    }

    /// `-H` values split at the first colon. Values are trimmed.
    pub fn headers(&self) -> Result<Vec<(String, String)>, String> {
        self.headers
            .iter()
            .map(|raw| {
                let (name, value) = raw
                    .split_once(':')
                    .ok_or_else(|| format!("header must look like \"Name: value\": {raw}"))?;
                Ok((name.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }

    /// `-q` values split at the first `=`.
    pub fn query_params(&self) -> Result<Vec<(String, String)>, String> {
        self.query
            .iter()
            .map(|raw| {
                raw.split_once('=')
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .ok_or_else(|| format!("query parameter must look like name=value: {raw}"))
            })
            .collect()
    }

    /// The auth strategy named by the flags, or `None` when no auth flag is set.
    ///
    /// Flags are turned into a credential set and checked the same way
    /// stored credentials are.
    pub fn auth(&self) -> Result<AuthStrategy, AuthError> {
        let (kind, credentials) = self.auth_credentials();
        AuthStrategy::from_credentials(kind, &credentials)
    }

    fn auth_credentials(&self) -> (&'static str, HashMap<String, String>) {
        let mut credentials = HashMap::new();

        if let Some(raw) = &self.basic {
            let (username, password) = split_pair(raw, ':');
            credentials.insert("username".to_string(), username);
            if let Some(password) = password {
                credentials.insert("password".to_string(), password);
            }
            return (KIND_BASIC, credentials);
        }

        if let Some(token) = &self.bearer {
            credentials.insert("token".to_string(), token.clone());
            return (KIND_BEARER, credentials);
        }

        if let Some(raw) = &self.api_key {
            let (key, value) = split_pair(raw, '=');
            credentials.insert("key".to_string(), key);
            if let Some(value) = value {
                credentials.insert("value".to_string(), value);
            }
            credentials.insert("location".to_string(), self.api_key_in.clone());
            return (KIND_API_KEY, credentials);
        }

        (KIND_NONE, credentials)
    }
}

fn split_pair(raw: &str, separator: char) -> (String, Option<String>) {
    match raw.split_once(separator) {
        Some((first, second)) => (first.to_string(), Some(second.to_string())),
        None => (raw.to_string(), None),
    }
}
